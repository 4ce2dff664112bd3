//! Frame sources.
//!
//! This module provides the device side of the pipeline:
//! - `FrameSource`: open device handle with a single blocking `grab`
//! - `DeviceId` / `parse_device_identifier`: typed device identifiers
//! - `open_source`: picks a backend for an identifier
//!
//! Backends:
//! - Synthetic pattern generator (`stub://...`, always available)
//! - Still image files (feature: image-file)
//! - USB/V4L2 devices by index or device node (feature: ingest-v4l2)
//! - Network and file URIs through GStreamer (feature: rtsp-gstreamer)
//! - Middleware subscriptions (receiver mode, see `SubscriptionSource`)
//!
//! Sources report two kinds of grab failure. `GrabError::NoFrame` is transient and
//! the caller substitutes a cached frame. `GrabError::Ended` means the device will
//! not produce again.

#[cfg(feature = "image-file")]
pub mod image_file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "rtsp-gstreamer")]
pub mod stream;
pub mod subscription;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::config::CaptureConfig;
use crate::frame::Frame;

#[cfg(feature = "image-file")]
pub use image_file::ImageFileSource;
#[cfg(feature = "rtsp-gstreamer")]
pub use stream::StreamSource;
pub use subscription::SubscriptionSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Scheme that selects the synthetic backend.
pub const STUB_SCHEME: &str = "stub";

/// Fatal failure to reach a device. The pipeline never starts.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to open {device}: {reason}")]
    OpenFailed { device: String, reason: String },

    #[error("{device} requires the {feature} feature")]
    BackendDisabled {
        device: String,
        feature: &'static str,
    },

    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of a single `grab`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrabError {
    /// The device returned nothing this time; later grabs may succeed.
    #[error("no frame: {0}")]
    NoFrame(String),

    /// The device is exhausted or closed.
    #[error("source ended: {0}")]
    Ended(String),
}

impl GrabError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GrabError::NoFrame(_))
    }
}

/// Geometry a source actually delivers, which may differ from what was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// An open capture device.
///
/// `grab` is the only method allowed to block for device I/O. After `close`,
/// `is_open` reports false and `grab` returns `GrabError::Ended`.
pub trait FrameSource: Send {
    /// Human-readable identifier for logs.
    fn describe(&self) -> String;

    fn is_open(&self) -> bool;

    /// Block until the device yields a frame or fails.
    fn grab(&mut self) -> Result<Frame, GrabError>;

    fn geometry(&self) -> SourceGeometry;

    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn grab(&mut self) -> Result<Frame, GrabError> {
        (**self).grab()
    }

    fn geometry(&self) -> SourceGeometry {
        (**self).geometry()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Typed capture device identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceId {
    /// Camera index (`0`, `/dev/video0`).
    Index(u32),
    /// Local file or device node.
    Path(PathBuf),
    /// Anything with a URL scheme (`rtsp://`, `stub://`, `file://`).
    Uri(Url),
}

impl DeviceId {
    pub fn parse(raw: &str) -> DeviceId {
        parse_device_identifier(raw)
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, DeviceId::Uri(url) if url.scheme() == STUB_SCHEME)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Index(index) => write!(f, "camera #{index}"),
            DeviceId::Path(path) => write!(f, "{}", path.display()),
            DeviceId::Uri(url) => write!(f, "{url}"),
        }
    }
}

/// Interpret a device string: integers and `/dev/videoN` become indices, strings
/// with a URL scheme become URIs, everything else is a path.
pub fn parse_device_identifier(raw: &str) -> DeviceId {
    let raw = raw.trim();
    if let Ok(index) = raw.parse::<u32>() {
        return DeviceId::Index(index);
    }
    if let Some(stripped) = raw.strip_prefix("/dev/video") {
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = stripped.parse::<u32>() {
                return DeviceId::Index(index);
            }
        }
    }
    if raw.contains("://") {
        if let Ok(url) = Url::parse(raw) {
            return DeviceId::Uri(url);
        }
    }
    DeviceId::Path(PathBuf::from(raw))
}

/// Open the backend matching `device`, configured for `config`'s geometry.
pub fn open_source(
    device: &DeviceId,
    config: &CaptureConfig,
) -> Result<Box<dyn FrameSource>, OpenError> {
    config
        .validate()
        .map_err(|err| OpenError::InvalidConfig(err.to_string()))?;

    match device {
        DeviceId::Uri(url) if url.scheme() == STUB_SCHEME => {
            Ok(Box::new(SyntheticSource::open(url, config)?))
        }
        DeviceId::Uri(url) => open_uri(url, config),
        DeviceId::Index(index) => open_index(*index, config),
        DeviceId::Path(path) => open_path(path, config),
    }
}

#[cfg(feature = "rtsp-gstreamer")]
fn open_uri(url: &Url, config: &CaptureConfig) -> Result<Box<dyn FrameSource>, OpenError> {
    Ok(Box::new(StreamSource::open(url, config)?))
}

#[cfg(not(feature = "rtsp-gstreamer"))]
fn open_uri(url: &Url, _config: &CaptureConfig) -> Result<Box<dyn FrameSource>, OpenError> {
    Err(OpenError::BackendDisabled {
        device: url.to_string(),
        feature: "rtsp-gstreamer",
    })
}

#[cfg(feature = "ingest-v4l2")]
fn open_index(index: u32, config: &CaptureConfig) -> Result<Box<dyn FrameSource>, OpenError> {
    let path = format!("/dev/video{index}");
    Ok(Box::new(V4l2Source::open(&path, config)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_index(index: u32, _config: &CaptureConfig) -> Result<Box<dyn FrameSource>, OpenError> {
    Err(OpenError::BackendDisabled {
        device: DeviceId::Index(index).to_string(),
        feature: "ingest-v4l2",
    })
}

fn open_path(
    path: &std::path::Path,
    config: &CaptureConfig,
) -> Result<Box<dyn FrameSource>, OpenError> {
    let display = path.display().to_string();
    if display.is_empty() || !path.exists() {
        return Err(OpenError::DeviceNotFound(display));
    }

    if path.starts_with("/dev") {
        #[cfg(feature = "ingest-v4l2")]
        {
            return Ok(Box::new(V4l2Source::open(&display, config)?));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            return Err(OpenError::BackendDisabled {
                device: display,
                feature: "ingest-v4l2",
            });
        }
    }

    #[cfg(feature = "image-file")]
    {
        Ok(Box::new(ImageFileSource::open(path, config)?))
    }
    #[cfg(not(feature = "image-file"))]
    {
        let _ = config;
        Err(OpenError::BackendDisabled {
            device: display,
            feature: "image-file",
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_parse_as_indices() {
        assert_eq!(parse_device_identifier("0"), DeviceId::Index(0));
        assert_eq!(parse_device_identifier(" 2 "), DeviceId::Index(2));
    }

    #[test]
    fn video_device_nodes_parse_as_indices() {
        assert_eq!(parse_device_identifier("/dev/video3"), DeviceId::Index(3));
        assert_eq!(
            parse_device_identifier("/dev/video"),
            DeviceId::Path(PathBuf::from("/dev/video"))
        );
    }

    #[test]
    fn schemes_parse_as_uris() {
        let id = parse_device_identifier("rtsp://192.168.1.10:554/stream");
        match id {
            DeviceId::Uri(url) => assert_eq!(url.scheme(), "rtsp"),
            other => panic!("expected uri, got {other:?}"),
        }
        assert!(parse_device_identifier("stub://front").is_stub());
    }

    #[test]
    fn other_strings_parse_as_paths() {
        assert_eq!(
            parse_device_identifier("clips/intro.png"),
            DeviceId::Path(PathBuf::from("clips/intro.png"))
        );
        assert_eq!(
            parse_device_identifier("-1"),
            DeviceId::Path(PathBuf::from("-1"))
        );
    }

    #[test]
    fn missing_path_is_device_not_found() {
        let err = open_source(
            &DeviceId::Path(PathBuf::from("/nonexistent/capture-relay/frame.png")),
            &CaptureConfig::default(),
        )
        .err()
        .expect("open must fail");
        assert!(matches!(err, OpenError::DeviceNotFound(_)));
    }

    #[test]
    fn stub_uri_opens_synthetic_source() -> Result<(), OpenError> {
        let mut source = open_source(
            &parse_device_identifier("stub://test"),
            &CaptureConfig::default(),
        )?;
        assert!(source.is_open());
        let frame = source.grab().expect("frame");
        assert_eq!(frame.dimensions(), (320, 240));
        source.close();
        assert!(!source.is_open());
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected_before_open() {
        let config = CaptureConfig {
            width: 0,
            ..CaptureConfig::default()
        };
        let err = open_source(&parse_device_identifier("stub://test"), &config)
            .err()
            .expect("open must fail");
        assert!(matches!(err, OpenError::InvalidConfig(_)));
    }

    #[test]
    fn grab_error_classes() {
        assert!(GrabError::NoFrame("hiccup".into()).is_transient());
        assert!(!GrabError::Ended("eof".into()).is_transient());
    }
}
