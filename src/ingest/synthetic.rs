//! Synthetic frame source for `stub://` identifiers.
//!
//! Generates a shifting gradient at the configured geometry. Query parameters
//! shape the stream for tests and demos:
//! - `frames=N`: end the stream after N frames
//! - `fail_every=K`: every K-th grab returns `GrabError::NoFrame`

use url::Url;

use super::{FrameSource, GrabError, OpenError, SourceGeometry};
use crate::config::CaptureConfig;
use crate::frame::Frame;

pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    channels: u8,
    fps: u32,
    frame_limit: Option<u64>,
    fail_every: Option<u64>,
    grabs: u64,
    frames_produced: u64,
    /// Simulated scene state, bumped every 50 frames.
    scene_state: u8,
    open: bool,
}

impl SyntheticSource {
    pub fn open(url: &Url, config: &CaptureConfig) -> Result<Self, OpenError> {
        let mut frame_limit = None;
        let mut fail_every = None;
        for (key, value) in url.query_pairs() {
            let parsed = value.parse::<u64>().map_err(|_| OpenError::OpenFailed {
                device: url.to_string(),
                reason: format!("query parameter {key} must be an integer"),
            })?;
            match key.as_ref() {
                "frames" => frame_limit = Some(parsed),
                "fail_every" if parsed > 0 => fail_every = Some(parsed),
                _ => log::debug!("SyntheticSource: ignoring query parameter {}", key),
            }
        }

        let name = url.host_str().unwrap_or("synthetic").to_string();
        log::info!(
            "SyntheticSource: opened {} ({}x{}, {} channel(s))",
            name,
            config.width,
            config.height,
            config.channels
        );

        Ok(Self {
            name,
            width: config.width,
            height: config.height,
            channels: config.channels,
            fps: config.fps,
            frame_limit,
            fail_every,
            grabs: 0,
            frames_produced: 0,
            scene_state: 0,
            open: true,
        })
    }

    pub fn frames_produced(&self) -> u64 {
        self.frames_produced
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let len = self.width as usize * self.height as usize * self.channels as usize;

        if self.frames_produced.is_multiple_of(50) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let shift = self.frames_produced + self.scene_state as u64;
        let mut pixels = vec![0u8; len];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + shift) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{}", self.name)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn grab(&mut self) -> Result<Frame, GrabError> {
        if !self.open {
            return Err(GrabError::Ended(format!("{} is closed", self.describe())));
        }
        if let Some(limit) = self.frame_limit {
            if self.frames_produced >= limit {
                self.open = false;
                return Err(GrabError::Ended(format!(
                    "{} produced its {} frames",
                    self.describe(),
                    limit
                )));
            }
        }

        self.grabs += 1;
        if let Some(every) = self.fail_every {
            if self.grabs.is_multiple_of(every) {
                return Err(GrabError::NoFrame(format!(
                    "{} skipped grab {}",
                    self.describe(),
                    self.grabs
                )));
            }
        }

        let pixels = self.generate_pixels();
        self.frames_produced += 1;
        Frame::new(pixels, self.width, self.height, self.channels)
            .map_err(|err| GrabError::Ended(err.to_string()))
    }

    fn geometry(&self) -> SourceGeometry {
        SourceGeometry {
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }

    fn close(&mut self) {
        if self.open {
            log::info!(
                "SyntheticSource: {} closed after {} frames",
                self.describe(),
                self.frames_produced
            );
        }
        self.open = false;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn open(raw: &str) -> SyntheticSource {
        let url = Url::parse(raw).unwrap();
        SyntheticSource::open(&url, &CaptureConfig::default()).unwrap()
    }

    #[test]
    fn produces_frames_at_configured_geometry() -> Result<(), GrabError> {
        let mut source = open("stub://test");
        let frame = source.grab()?;
        assert_eq!(frame.dimensions(), (320, 240));
        assert_eq!(frame.channels(), 3);
        Ok(())
    }

    #[test]
    fn consecutive_frames_differ() -> Result<(), GrabError> {
        let mut source = open("stub://test");
        let first = source.grab()?;
        let second = source.grab()?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn frame_limit_ends_stream() {
        let mut source = open("stub://test?frames=2");
        assert!(source.grab().is_ok());
        assert!(source.grab().is_ok());
        assert!(matches!(source.grab(), Err(GrabError::Ended(_))));
        assert!(!source.is_open());
    }

    #[test]
    fn fail_every_injects_transient_failures() {
        let mut source = open("stub://test?fail_every=3");
        assert!(source.grab().is_ok());
        assert!(source.grab().is_ok());
        assert!(matches!(source.grab(), Err(GrabError::NoFrame(_))));
        assert!(source.grab().is_ok());
        assert_eq!(source.frames_produced(), 3);
    }

    #[test]
    fn non_numeric_query_is_open_error() {
        let url = Url::parse("stub://test?frames=many").unwrap();
        assert!(SyntheticSource::open(&url, &CaptureConfig::default()).is_err());
    }

    #[test]
    fn grab_after_close_reports_end() {
        let mut source = open("stub://test");
        source.close();
        assert!(matches!(source.grab(), Err(GrabError::Ended(_))));
    }
}
