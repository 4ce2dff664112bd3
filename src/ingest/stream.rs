//! GStreamer-backed source for network streams and media files.
//!
//! Any URI `uridecodebin` understands works: `rtsp://`, `http://`, `file://`.
//! Live streams drop stale samples; files are decoded in order.

use std::time::Duration;
use url::Url;

use gstreamer::prelude::*;

use super::{FrameSource, GrabError, OpenError, SourceGeometry};
use crate::config::CaptureConfig;
use crate::frame::{Frame, CHANNELS_GRAY};

pub struct StreamSource {
    uri: String,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    channels: u8,
    geometry: SourceGeometry,
    frames_captured: u64,
    open: bool,
}

impl StreamSource {
    pub fn open(url: &Url, config: &CaptureConfig) -> Result<Self, OpenError> {
        let failed = |reason: String| OpenError::OpenFailed {
            device: url.to_string(),
            reason,
        };

        gstreamer::init().map_err(|err| failed(format!("initialize gstreamer: {err}")))?;

        let live = url.scheme() != "file";
        let format = if config.channels == CHANNELS_GRAY {
            "GRAY8"
        } else {
            "RGB"
        };
        let description = format!(
            "uridecodebin uri=\"{}\" ! videoconvert ! video/x-raw,format={} ! \
             appsink name=appsink sync=false max-buffers={} drop={}",
            url,
            format,
            if live { 1 } else { config.queue_size.max(1) },
            live
        );
        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|err| failed(format!("build pipeline: {err}")))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| failed("pipeline is not a Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| failed("appsink element missing from pipeline".to_string()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| failed("appsink element has unexpected type".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|err| failed(format!("set pipeline to Playing: {err}")))?;
        log::info!("StreamSource: opened {} (live: {})", url, live);

        Ok(Self {
            uri: url.to_string(),
            pipeline,
            appsink,
            channels: config.channels,
            geometry: SourceGeometry {
                width: config.width,
                height: config.height,
                fps: config.fps,
            },
            frames_captured: 0,
            open: true,
        })
    }

    fn pull_timeout(&self) -> Duration {
        let per_frame_ms = 1000 / u64::from(self.geometry.fps.max(1));
        Duration::from_millis((per_frame_ms * 4).max(500))
    }

    fn poll_bus(&self) -> Result<(), GrabError> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(message) = bus.pop() {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Err(GrabError::Ended(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    )));
                }
                MessageView::Eos(..) => {
                    return Err(GrabError::Ended(format!("{} reached end of stream", self.uri)));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl FrameSource for StreamSource {
    fn describe(&self) -> String {
        self.uri.clone()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn grab(&mut self) -> Result<Frame, GrabError> {
        if !self.open {
            return Err(GrabError::Ended(format!("{} is closed", self.uri)));
        }

        let sample = match self.appsink.try_pull_sample(self.pull_timeout()) {
            Some(sample) => sample,
            None if self.appsink.is_eos() => {
                self.open = false;
                return Err(GrabError::Ended(format!("{} reached end of stream", self.uri)));
            }
            None => {
                if let Err(err) = self.poll_bus() {
                    self.open = false;
                    return Err(err);
                }
                return Err(GrabError::NoFrame(format!("{} stalled", self.uri)));
            }
        };

        let (pixels, width, height) = sample_to_pixels(&sample, self.channels)?;
        self.geometry.width = width;
        self.geometry.height = height;
        self.frames_captured += 1;
        Frame::new(pixels, width, height, self.channels)
            .map_err(|err| GrabError::NoFrame(err.to_string()))
    }

    fn geometry(&self) -> SourceGeometry {
        self.geometry
    }

    fn close(&mut self) {
        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("StreamSource: failed to stop {}: {}", self.uri, err);
        }
        if self.open {
            log::info!(
                "StreamSource: closed {} after {} frames",
                self.uri,
                self.frames_captured
            );
        }
        self.open = false;
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

/// Copy a sample into packed rows, dropping any stride padding.
fn sample_to_pixels(
    sample: &gstreamer::Sample,
    channels: u8,
) -> Result<(Vec<u8>, u32, u32), GrabError> {
    let dropped = |reason: &str| GrabError::NoFrame(reason.to_string());

    let buffer = sample.buffer().ok_or_else(|| dropped("sample missing buffer"))?;
    let caps = sample.caps().ok_or_else(|| dropped("sample missing caps"))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|err| GrabError::NoFrame(format!("parse caps as video info: {err}")))?;

    let width = info.width();
    let height = info.height();
    let row_bytes = width as usize * channels as usize;
    let stride = info.stride()[0] as usize;

    let map = buffer
        .map_readable()
        .map_err(|err| GrabError::NoFrame(format!("map buffer: {err}")))?;
    let data = map.as_slice();

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let packed = data
            .get(..len)
            .ok_or_else(|| dropped("buffer shorter than frame"))?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| dropped("buffer row is out of bounds"))?,
        );
    }
    Ok((pixels, width, height))
}
