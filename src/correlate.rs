//! Spatial identity correlation.
//!
//! Merges one inference pass's object boxes with the same pass's face
//! matches. A face attaches to a person box when its centroid lies
//! strictly inside the box; there is no cross-pass memory and no
//! closest-match tie-break.

use crate::detect::{ObjectBox, PERSON_LABEL};
use crate::face::IdentityMatch;

/// A face that cleared the gallery threshold, reduced to its centroid.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMatch {
    /// Centroid of the face bounding box, pixel coordinates.
    pub centroid: (f32, f32),
    pub identity: IdentityMatch,
}

/// One object box with any identity attached by correlation.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelatedBox {
    pub object: ObjectBox,
    pub identity: Option<IdentityMatch>,
}

/// Associate person boxes with face matches from the same pass.
///
/// The first face whose centroid falls strictly inside a person box wins;
/// boxes of other classes pass through unmodified.
pub fn correlate(boxes: Vec<ObjectBox>, faces: &[FaceMatch]) -> Vec<CorrelatedBox> {
    boxes
        .into_iter()
        .map(|object| {
            let identity = if object.label == PERSON_LABEL {
                faces
                    .iter()
                    .find(|face| {
                        object
                            .bbox
                            .contains_interior(face.centroid.0, face.centroid.1)
                    })
                    .map(|face| face.identity.clone())
            } else {
                None
            };
            CorrelatedBox { object, identity }
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;

    fn person(x1: f32, y1: f32, x2: f32, y2: f32) -> ObjectBox {
        ObjectBox {
            label: PERSON_LABEL.to_string(),
            confidence: 0.9,
            bbox: BBox::new(x1, y1, x2, y2),
        }
    }

    fn face(cx: f32, cy: f32, label: &str) -> FaceMatch {
        FaceMatch {
            centroid: (cx, cy),
            identity: IdentityMatch {
                label: label.to_string(),
                score: 0.8,
            },
        }
    }

    #[test]
    fn centroid_inside_attaches_identity() {
        let out = correlate(
            vec![person(10.0, 10.0, 110.0, 110.0)],
            &[face(50.0, 50.0, "Jane Doe")],
        );
        assert_eq!(out[0].identity.as_ref().unwrap().label, "Jane Doe");
    }

    #[test]
    fn centroid_on_edge_does_not_attach() {
        let out = correlate(
            vec![person(10.0, 10.0, 110.0, 110.0)],
            &[face(10.0, 50.0, "Jane Doe")],
        );
        assert!(out[0].identity.is_none());
    }

    #[test]
    fn centroid_outside_does_not_attach() {
        let out = correlate(
            vec![person(10.0, 10.0, 110.0, 110.0)],
            &[face(200.0, 200.0, "Jane Doe")],
        );
        assert!(out[0].identity.is_none());
    }

    #[test]
    fn first_containing_face_wins() {
        let out = correlate(
            vec![person(0.0, 0.0, 100.0, 100.0)],
            &[face(30.0, 30.0, "First"), face(60.0, 60.0, "Second")],
        );
        assert_eq!(out[0].identity.as_ref().unwrap().label, "First");
    }

    #[test]
    fn non_person_boxes_pass_through() {
        let knife = ObjectBox {
            label: "knife".to_string(),
            confidence: 0.7,
            bbox: BBox::new(0.0, 0.0, 100.0, 100.0),
        };
        let out = correlate(vec![knife.clone()], &[face(50.0, 50.0, "Jane Doe")]);
        assert_eq!(out[0].object, knife);
        assert!(out[0].identity.is_none());
    }

    #[test]
    fn each_person_box_checked_independently() {
        let out = correlate(
            vec![person(0.0, 0.0, 40.0, 40.0), person(60.0, 60.0, 100.0, 100.0)],
            &[face(80.0, 80.0, "Jane Doe")],
        );
        assert!(out[0].identity.is_none());
        assert_eq!(out[1].identity.as_ref().unwrap().label, "Jane Doe");
    }
}
