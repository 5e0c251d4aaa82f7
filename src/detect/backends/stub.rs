use anyhow::Result;

use crate::detect::backend::ObjectDetector;
use crate::detect::result::ObjectBox;
use crate::frame::Frame;

/// Deterministic detector backend for tests and the demo daemon.
///
/// Emits a fixed set of boxes. In motion-gated mode the boxes are only
/// emitted when the frame content changed since the previous call, which
/// approximates a real detector's behavior against the synthetic camera.
pub struct StubObjectDetector {
    boxes: Vec<ObjectBox>,
    motion_gated: bool,
    last_checksum: Option<u64>,
}

impl StubObjectDetector {
    /// Emit the given boxes on every pass.
    pub fn new(boxes: Vec<ObjectBox>) -> Self {
        Self {
            boxes,
            motion_gated: false,
            last_checksum: None,
        }
    }

    /// Emit the given boxes only when the frame content changed.
    pub fn motion_gated(boxes: Vec<ObjectBox>) -> Self {
        Self {
            boxes,
            motion_gated: true,
            last_checksum: None,
        }
    }
}

impl ObjectDetector for StubObjectDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectBox>> {
        if self.motion_gated {
            let checksum = frame
                .pixels()
                .iter()
                .fold(0u64, |acc, &p| acc.wrapping_mul(31).wrapping_add(p as u64));
            let changed = self.last_checksum.is_some_and(|prev| prev != checksum);
            self.last_checksum = Some(checksum);
            if !changed {
                return Ok(Vec::new());
            }
        }
        Ok(self.boxes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BBox;

    fn person_box() -> ObjectBox {
        ObjectBox {
            label: "person".to_string(),
            confidence: 0.9,
            bbox: BBox::new(10.0, 10.0, 110.0, 110.0),
        }
    }

    fn frame(fill: u8) -> Frame {
        Frame::new(vec![fill; 12], 2, 2, 1, 0)
    }

    #[test]
    fn emits_configured_boxes() {
        let mut detector = StubObjectDetector::new(vec![person_box()]);
        let boxes = detector.detect(&frame(0)).unwrap();
        assert_eq!(boxes, vec![person_box()]);
    }

    #[test]
    fn motion_gated_waits_for_change() {
        let mut detector = StubObjectDetector::motion_gated(vec![person_box()]);

        // First frame: nothing to compare against.
        assert!(detector.detect(&frame(1)).unwrap().is_empty());
        // Same content: still quiet.
        assert!(detector.detect(&frame(1)).unwrap().is_empty());
        // Changed content: boxes come through.
        assert_eq!(detector.detect(&frame(2)).unwrap(), vec![person_box()]);
    }
}
