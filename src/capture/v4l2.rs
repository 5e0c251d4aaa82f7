//! V4L2 capture device (feature `capture-v4l2`).
//!
//! Opens a local device node, negotiates RGB3 at the requested
//! resolution, and maps a single buffer so device-side queueing stays
//! minimal and reads return the freshest frame the driver has.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::device::{CameraConfig, CaptureDevice};

pub(crate) struct V4l2Device {
    state: DeviceState,
    width: u32,
    height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Device {
    pub(crate) fn open(config: &CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&config.device)
            .with_context(|| format!("open v4l2 device {}", config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "capture: failed to set format on {}: {}",
                    config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("capture: failed to set fps on {}: {}", config.device, err);
            }
        }

        let width = format.width;
        let height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 1)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!("capture: opened {} ({}x{})", config.device, width, height);
        Ok(Self {
            state,
            width,
            height,
        })
    }
}

impl CaptureDevice for V4l2Device {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        use v4l::io::traits::CaptureStream;

        self.state.with_stream_mut(|stream| {
            let (buf, _meta) = stream.next().context("capture v4l2 frame")?;
            Ok(buf.to_vec())
        })
    }
}
