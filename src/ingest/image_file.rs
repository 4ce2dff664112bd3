//! Still image as a one-frame source.
//!
//! The file is decoded at open. The first grab yields it; the next one ends the
//! stream.

use std::path::Path;

use super::{FrameSource, GrabError, OpenError, SourceGeometry};
use crate::config::CaptureConfig;
use crate::frame::{Frame, CHANNELS_GRAY};

pub struct ImageFileSource {
    path: String,
    pending: Option<Frame>,
    geometry: SourceGeometry,
    open: bool,
}

impl ImageFileSource {
    pub fn open(path: &Path, config: &CaptureConfig) -> Result<Self, OpenError> {
        let display = path.display().to_string();
        let image = image::open(path).map_err(|err| OpenError::OpenFailed {
            device: display.clone(),
            reason: format!("decode image: {err}"),
        })?;

        let (width, height) = (image.width(), image.height());
        let pixels = if config.channels == CHANNELS_GRAY {
            image.into_luma8().into_raw()
        } else {
            image.into_rgb8().into_raw()
        };
        let frame =
            Frame::new(pixels, width, height, config.channels).map_err(|err| {
                OpenError::OpenFailed {
                    device: display.clone(),
                    reason: err.to_string(),
                }
            })?;

        log::info!("ImageFileSource: opened {} ({}x{})", display, width, height);
        Ok(Self {
            path: display,
            pending: Some(frame),
            geometry: SourceGeometry {
                width,
                height,
                fps: config.fps,
            },
            open: true,
        })
    }
}

impl FrameSource for ImageFileSource {
    fn describe(&self) -> String {
        self.path.clone()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn grab(&mut self) -> Result<Frame, GrabError> {
        match self.pending.take() {
            Some(frame) if self.open => Ok(frame),
            _ => {
                self.open = false;
                Err(GrabError::Ended(format!("{} already delivered", self.path)))
            }
        }
    }

    fn geometry(&self) -> SourceGeometry {
        self.geometry
    }

    fn close(&mut self) {
        self.pending = None;
        self.open = false;
    }
}
