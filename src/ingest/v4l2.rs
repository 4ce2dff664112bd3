//! V4L2 frame source.
//!
//! Captures from local device nodes (`/dev/video0`) through memory-mapped
//! streaming. The driver may not honour the requested geometry; `geometry()`
//! reports what it actually negotiated.

use ouroboros::self_referencing;

use super::normalize::{normalize, PixelFormat};
use super::{FrameSource, GrabError, OpenError, SourceGeometry};
use crate::config::CaptureConfig;
use crate::frame::Frame;

const STREAM_BUFFERS: u32 = 4;

pub struct V4l2Source {
    device: String,
    state: Option<V4l2State>,
    format: PixelFormat,
    channels: u8,
    geometry: SourceGeometry,
    frames_captured: u64,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn open(device_path: &str, config: &CaptureConfig) -> Result<Self, OpenError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let failed = |reason: String| OpenError::OpenFailed {
            device: device_path.to_string(),
            reason,
        };

        let mut device = v4l::Device::with_path(device_path)
            .map_err(|err| failed(format!("open device: {err}")))?;
        let mut format = device
            .format()
            .map_err(|err| failed(format!("read format: {err}")))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    device_path,
                    err
                );
                device
                    .format()
                    .map_err(|err| failed(format!("read format after set failure: {err}")))?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr)
            .ok_or_else(|| failed(format!("unsupported pixel format {}", format.fourcc)))?;

        let params = v4l::video::capture::Parameters::with_fps(config.fps);
        let fps = match device.set_params(&params) {
            Ok(applied) => fps_from_interval(applied.interval).unwrap_or(config.fps),
            Err(err) => {
                log::warn!("V4l2Source: failed to set fps on {}: {}", device_path, err);
                config.fps
            }
        };

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            },
        }
        .try_build()
        .map_err(|err| failed(format!("create buffer stream: {err}")))?;

        log::info!(
            "V4l2Source: opened {} ({}x{} {:?} @ {} fps)",
            device_path,
            format.width,
            format.height,
            pixel_format,
            fps
        );

        Ok(Self {
            device: device_path.to_string(),
            state: Some(state),
            format: pixel_format,
            channels: config.channels,
            geometry: SourceGeometry {
                width: format.width,
                height: format.height,
                fps,
            },
            frames_captured: 0,
        })
    }
}

fn fps_from_interval(interval: v4l::Fraction) -> Option<u32> {
    if interval.numerator == 0 {
        return None;
    }
    Some(interval.denominator / interval.numerator).filter(|fps| *fps > 0)
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        self.device.clone()
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn grab(&mut self) -> Result<Frame, GrabError> {
        use v4l::io::traits::CaptureStream;

        let SourceGeometry { width, height, .. } = self.geometry;
        let (format, channels) = (self.format, self.channels);
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| GrabError::Ended(format!("{} is closed", self.device)))?;

        let pixels = state.with_mut(|fields| match fields.stream.next() {
            Ok((buf, _meta)) => normalize(buf, width, height, format, channels),
            Err(err) => Err(GrabError::NoFrame(format!("capture: {err}"))),
        })?;

        self.frames_captured += 1;
        Frame::new(pixels, width, height, channels)
            .map_err(|err| GrabError::NoFrame(err.to_string()))
    }

    fn geometry(&self) -> SourceGeometry {
        self.geometry
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: closed {} after {} frames",
                self.device,
                self.frames_captured
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_open() {
        let result =
            V4l2Source::open("/dev/video-capture-relay-missing", &CaptureConfig::default());
        assert!(matches!(result, Err(OpenError::OpenFailed { .. })));
    }

    #[test]
    fn interval_to_fps() {
        assert_eq!(fps_from_interval(v4l::Fraction::new(1, 30)), Some(30));
        assert_eq!(fps_from_interval(v4l::Fraction::new(0, 30)), None);
    }
}
