//! Consumer-facing capture handle.
//!
//! A `CaptureHandle` composes a `FrameSource`, an optional acquisition thread with
//! its bounded buffer, and an optional `Publishable`. Lifecycle:
//!
//! ```text
//! Closed --open--> Open --release(false), frames buffered--> Draining
//!                   |                                          |
//!                   +--release(true) / source drained--> Released <--+
//! ```
//!
//! In threaded mode the acquisition thread owns the source and the frame
//! conditioner (resize, flip, last-frame substitution). Otherwise the handle
//! holds both and every `read()` performs exactly one `grab()`.

use std::fmt;
use thiserror::Error;

use crate::acquisition::AcquisitionLoop;
use crate::conditioner::{Conditioned, FrameConditioner};
use crate::config::CaptureConfig;
use crate::frame::Frame;
use crate::ingest::{open_source, DeviceId, FrameSource, OpenError, SourceGeometry};
use crate::transport::{PublishTarget, Publishable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// No device attached yet.
    Closed,
    Open,
    /// Release requested; buffered frames are still being delivered.
    Draining,
    Released,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Closed => "closed",
            LifecycleState::Open => "open",
            LifecycleState::Draining => "draining",
            LifecycleState::Released => "released",
        };
        f.write_str(name)
    }
}

/// Properties exposed through `get` / `set`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Property {
    Width,
    Height,
    Fps,
    /// Frames delivered so far.
    Position,
    /// Synthetic timestamp derived from position and fps.
    PositionMsec,
    FrameCount,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0:?} cannot change while the acquisition thread is running")]
    PropertyLocked(Property),

    #[error("invalid value {value} for {property:?}")]
    InvalidValue { property: Property, value: f64 },

    #[error("cannot {operation} a {state} capture handle")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error(transparent)]
    Open(#[from] OpenError),
}

/// Counters for status output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub produced: u64,
    pub substituted: u64,
    pub delivered: u64,
    pub buffered: usize,
}

/// Outcome of one acquisition step.
enum Acquired {
    Frame(Frame),
    /// No frame this time; the handle stays open.
    Missed,
    /// Released, or never opened.
    Done,
}

enum Mode {
    Threaded {
        acquisition: AcquisitionLoop,
        geometry: SourceGeometry,
    },
    Direct {
        source: Box<dyn FrameSource>,
        conditioner: FrameConditioner,
    },
}

pub struct CaptureHandle {
    config: CaptureConfig,
    state: LifecycleState,
    mode: Option<Mode>,
    device: String,
    publisher: Option<(Box<dyn Publishable>, PublishTarget)>,
    /// Frame acquired by `grab()` and not yet retrieved.
    stashed: Option<Frame>,
    position: u64,
    frame_count: Option<u64>,
    delivered: u64,
}

impl CaptureHandle {
    /// A handle in the `Closed` state. Fails only on invalid configuration.
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        config
            .validate()
            .map_err(|err| OpenError::InvalidConfig(err.to_string()))?;
        Ok(Self {
            config,
            state: LifecycleState::Closed,
            mode: None,
            device: String::new(),
            publisher: None,
            stashed: None,
            position: 0,
            frame_count: None,
            delivered: 0,
        })
    }

    /// Open `device` and start acquiring.
    pub fn open_device(device: &DeviceId, config: CaptureConfig) -> Result<Self, CaptureError> {
        let mut handle = Self::new(config)?;
        handle.open(device)?;
        Ok(handle)
    }

    /// Wrap an already-open source.
    pub fn from_source(
        source: Box<dyn FrameSource>,
        config: CaptureConfig,
    ) -> Result<Self, CaptureError> {
        let mut handle = Self::new(config)?;
        handle.attach(source)?;
        Ok(handle)
    }

    pub fn open(&mut self, device: &DeviceId) -> Result<(), CaptureError> {
        self.ensure_closed("open")?;
        let source = open_source(device, &self.config)?;
        self.attach(source)
    }

    /// `Closed -> Open`. Starts the acquisition thread when multithreading is on.
    pub fn attach(&mut self, source: Box<dyn FrameSource>) -> Result<(), CaptureError> {
        self.ensure_closed("attach")?;
        let device = source.describe();
        if !source.is_open() {
            return Err(OpenError::OpenFailed {
                device,
                reason: "source is not open".to_string(),
            }
            .into());
        }

        let conditioner = FrameConditioner::new(&self.config);
        let mode = if self.config.multithreading {
            let geometry = source.geometry();
            let acquisition = AcquisitionLoop::spawn(
                source,
                conditioner,
                self.config.queue_size,
                self.config.backoff,
            )?;
            Mode::Threaded {
                acquisition,
                geometry,
            }
        } else {
            Mode::Direct {
                source,
                conditioner,
            }
        };

        log::info!(
            "CaptureHandle: opened {} ({}, queue {})",
            device,
            if self.config.multithreading {
                "threaded"
            } else {
                "direct"
            },
            self.config.queue_size
        );
        self.device = device;
        self.mode = Some(mode);
        self.state = LifecycleState::Open;
        Ok(())
    }

    /// Forward every frame delivered by `read()` to `publisher`.
    pub fn with_publisher(
        mut self,
        publisher: Box<dyn Publishable>,
        target: PublishTarget,
    ) -> Self {
        self.set_publisher(publisher, target);
        self
    }

    pub fn set_publisher(&mut self, publisher: Box<dyn Publishable>, target: PublishTarget) {
        self.publisher = Some((publisher, target));
    }

    fn ensure_closed(&self, operation: &'static str) -> Result<(), CaptureError> {
        if self.state == LifecycleState::Closed {
            Ok(())
        } else {
            Err(CaptureError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_threaded(&self) -> bool {
        matches!(self.mode, Some(Mode::Threaded { .. }))
    }

    /// Current lifecycle state.
    ///
    /// A threaded handle whose producer stopped on its own reports `Draining`
    /// while frames remain and `Released` once they are gone.
    pub fn state(&self) -> LifecycleState {
        match (&self.mode, self.state) {
            (Some(Mode::Threaded { acquisition, .. }), LifecycleState::Open)
                if acquisition.is_finished() =>
            {
                if self.has_pending() {
                    LifecycleState::Draining
                } else {
                    LifecycleState::Released
                }
            }
            (_, state) => state,
        }
    }

    /// Frames waiting in the buffer (plus a stashed one).
    pub fn buffered(&self) -> usize {
        let buffered = match &self.mode {
            Some(Mode::Threaded { acquisition, .. }) => acquisition.buffer().size(),
            _ => 0,
        };
        buffered + usize::from(self.stashed.is_some())
    }

    pub fn stats(&self) -> CaptureStats {
        let (produced, substituted) = match &self.mode {
            Some(Mode::Threaded { acquisition, .. }) => (
                acquisition.frames_produced(),
                acquisition.frames_substituted(),
            ),
            Some(Mode::Direct { conditioner, .. }) => {
                (conditioner.fresh_frames(), conditioner.substitutions())
            }
            None => (0, 0),
        };
        CaptureStats {
            produced,
            substituted,
            delivered: self.delivered,
            buffered: self.buffered(),
        }
    }

    fn has_pending(&self) -> bool {
        self.buffered() > 0
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Next frame, forwarded to the publisher if one is attached.
    ///
    /// Blocks in threaded mode until a frame is buffered. `None` with the
    /// handle released (or never opened) means no frame will follow. With
    /// `substitute_missing` off, a missed grab also returns `None` but leaves
    /// the handle `Open`.
    pub fn read(&mut self) -> Option<Frame> {
        let frame = self.retrieve()?;
        if let Some((publisher, target)) = self.publisher.as_mut() {
            if let Err(err) =
                publisher.publish(&target.topic, &frame, &target.carrier, target.should_wait)
            {
                log::warn!("CaptureHandle: publish to {} failed: {}", target.topic, err);
            }
        }
        Some(frame)
    }

    /// Like `read()` without publishing. Returns a frame stashed by `grab()` first.
    pub fn retrieve(&mut self) -> Option<Frame> {
        let frame = match self.stashed.take() {
            Some(frame) => frame,
            None => match self.acquire() {
                Acquired::Frame(frame) => frame,
                Acquired::Missed | Acquired::Done => return None,
            },
        };
        self.position += 1;
        self.delivered += 1;
        if self.state == LifecycleState::Draining && !self.has_pending() {
            self.finish();
        }
        Some(frame)
    }

    /// Acquire the next frame and keep it for `retrieve()`. Reports whether
    /// a frame is available.
    pub fn grab(&mut self) -> bool {
        if self.stashed.is_some() {
            return true;
        }
        match self.acquire() {
            Acquired::Frame(frame) => {
                self.stashed = Some(frame);
                true
            }
            Acquired::Missed | Acquired::Done => false,
        }
    }

    /// Poll for a buffered frame up to `max_tries` times, `poll_interval` apart.
    pub fn has_next(&self, max_tries: u32) -> bool {
        if self.stashed.is_some() {
            return true;
        }
        match &self.mode {
            Some(Mode::Threaded { acquisition, .. }) => {
                let buffer = acquisition.buffer();
                for attempt in 0..max_tries.max(1) {
                    if !buffer.is_empty() {
                        return true;
                    }
                    if acquisition.is_finished() || buffer.is_input_closed() {
                        return !buffer.is_empty();
                    }
                    if attempt + 1 < max_tries {
                        std::thread::sleep(self.config.poll_interval);
                    }
                }
                !buffer.is_empty()
            }
            Some(Mode::Direct { source, .. }) => {
                self.state == LifecycleState::Open && source.is_open()
            }
            None => false,
        }
    }

    /// One acquisition step, without position accounting.
    fn acquire(&mut self) -> Acquired {
        if matches!(
            self.state,
            LifecycleState::Closed | LifecycleState::Released
        ) {
            return Acquired::Done;
        }

        let outcome = match self.mode.as_mut() {
            None => return Acquired::Done,
            Some(Mode::Threaded { acquisition, .. }) => acquisition.buffer().take().ok_or(None),
            Some(Mode::Direct {
                source,
                conditioner,
            }) => {
                if self.state != LifecycleState::Open {
                    Err(None)
                } else {
                    match conditioner.condition(source.grab()) {
                        Conditioned::Fresh(frame) | Conditioned::Substituted(frame) => Ok(frame),
                        Conditioned::Missed => return Acquired::Missed,
                        Conditioned::Ended(err) => Err(Some(err)),
                    }
                }
            }
        };

        match outcome {
            Ok(frame) => Acquired::Frame(frame),
            Err(reason) => {
                match reason {
                    Some(err) => log::info!("CaptureHandle: {} ended: {}", self.device, err),
                    None => log::debug!("CaptureHandle: {} has no more frames", self.device),
                }
                self.finish();
                Acquired::Done
            }
        }
    }

    // ------------------------------------------------------------------------
    // Release
    // ------------------------------------------------------------------------

    /// Release the device.
    ///
    /// Forced: stop and join the producer, close the source, discard pending
    /// frames, return `true`. Otherwise stop the producer and return `false`
    /// while frames remain (`Draining`; the handle finishes releasing once
    /// they are read), or release and return `true` if nothing is pending.
    pub fn release(&mut self, force: bool) -> bool {
        match self.state {
            LifecycleState::Released => return true,
            LifecycleState::Closed => {
                self.state = LifecycleState::Released;
                return true;
            }
            LifecycleState::Open | LifecycleState::Draining => {}
        }

        if force {
            self.stashed = None;
            let discarded = match self.mode.as_mut() {
                Some(Mode::Threaded { acquisition, .. }) => {
                    acquisition.request_stop();
                    acquisition.join();
                    acquisition.buffer().clear()
                }
                _ => 0,
            };
            if discarded > 0 {
                log::info!(
                    "CaptureHandle: discarded {} buffered frame(s) from {}",
                    discarded,
                    self.device
                );
            }
            self.finish();
            return true;
        }

        let pending = match self.mode.as_ref() {
            Some(Mode::Threaded { acquisition, .. }) => {
                acquisition.request_stop();
                self.has_next(self.config.has_next_tries)
            }
            _ => self.stashed.is_some(),
        };
        if pending {
            if self.state != LifecycleState::Draining {
                log::info!(
                    "CaptureHandle: draining {} ({} frame(s) pending)",
                    self.device,
                    self.buffered()
                );
            }
            self.state = LifecycleState::Draining;
            false
        } else {
            self.finish();
            true
        }
    }

    /// Stop and join the producer or close the source, then mark released.
    fn finish(&mut self) {
        match self.mode.as_mut() {
            Some(Mode::Threaded { acquisition, .. }) => {
                acquisition.request_stop();
                acquisition.join();
            }
            Some(Mode::Direct { source, .. }) => source.close(),
            None => {}
        }
        if self.state != LifecycleState::Released {
            log::info!(
                "CaptureHandle: released {} after {} frame(s)",
                self.device,
                self.delivered
            );
        }
        self.state = LifecycleState::Released;
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    pub fn get(&self, property: Property) -> f64 {
        match property {
            Property::Width => f64::from(self.geometry().width),
            Property::Height => f64::from(self.geometry().height),
            Property::Fps => f64::from(self.config.fps),
            Property::Position => self.position as f64,
            Property::PositionMsec => self.position_msec() as f64,
            Property::FrameCount => self
                .frame_count
                .unwrap_or_else(|| self.stats().produced) as f64,
        }
    }

    /// Adjust a property. Geometry is fixed while the acquisition thread runs.
    pub fn set(&mut self, property: Property, value: f64) -> Result<(), CaptureError> {
        if !value.is_finite() || value < 0.0 || value >= u64::MAX as f64 {
            return Err(CaptureError::InvalidValue { property, value });
        }
        let whole = value.round() as u64;
        let positive = |v: u64| -> Result<u32, CaptureError> {
            u32::try_from(v)
                .ok()
                .filter(|v| *v > 0)
                .ok_or(CaptureError::InvalidValue { property, value })
        };

        match property {
            Property::Width | Property::Height => {
                if self.is_threaded() {
                    return Err(CaptureError::PropertyLocked(property));
                }
                let dimension = positive(whole)?;
                if property == Property::Width {
                    self.config.width = dimension;
                } else {
                    self.config.height = dimension;
                }
                if let Some(Mode::Direct { conditioner, .. }) = self.mode.as_mut() {
                    conditioner.set_target(self.config.width, self.config.height);
                }
            }
            Property::Fps => self.config.fps = positive(whole)?,
            Property::Position => self.position = whole,
            Property::PositionMsec => {
                self.position = whole
                    .checked_mul(u64::from(self.config.fps))
                    .map(|scaled| scaled / 1000)
                    .ok_or(CaptureError::InvalidValue { property, value })?;
            }
            Property::FrameCount => self.frame_count = Some(whole),
        }
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn position_msec(&self) -> u64 {
        let msec = u128::from(self.position) * 1000 / u128::from(self.config.fps.max(1));
        u64::try_from(msec).unwrap_or(u64::MAX)
    }

    /// Geometry of delivered frames.
    pub fn geometry(&self) -> SourceGeometry {
        let configured = SourceGeometry {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.fps,
        };
        if self.config.force_resize {
            return configured;
        }
        let reported = match &self.mode {
            Some(Mode::Threaded { geometry, .. }) => *geometry,
            Some(Mode::Direct { source, .. }) => source.geometry(),
            None => return configured,
        };
        SourceGeometry {
            fps: self.config.fps,
            ..reported
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release(true);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CHANNELS_GRAY;
    use crate::ingest::GrabError;
    use std::collections::VecDeque;

    struct Scripted {
        script: VecDeque<Result<Frame, GrabError>>,
        open: bool,
    }

    impl Scripted {
        fn boxed(script: Vec<Result<Frame, GrabError>>) -> Box<dyn FrameSource> {
            Box::new(Self {
                script: script.into(),
                open: true,
            })
        }
    }

    impl FrameSource for Scripted {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn grab(&mut self) -> Result<Frame, GrabError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(GrabError::Ended("script exhausted".into())))
        }

        fn geometry(&self) -> SourceGeometry {
            SourceGeometry {
                width: 2,
                height: 1,
                fps: 10,
            }
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    fn gray(value: u8) -> Frame {
        Frame::new(vec![value, value], 2, 1, CHANNELS_GRAY).unwrap()
    }

    fn direct_config() -> CaptureConfig {
        CaptureConfig {
            width: 2,
            height: 1,
            fps: 10,
            channels: CHANNELS_GRAY,
            multithreading: false,
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn new_handle_is_closed_and_reads_nothing() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::new(direct_config())?;
        assert_eq!(handle.state(), LifecycleState::Closed);
        assert!(handle.read().is_none());
        assert!(!handle.has_next(1));
        Ok(())
    }

    #[test]
    fn attach_twice_is_rejected() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::from_source(Scripted::boxed(vec![]), direct_config())?;
        let err = handle.attach(Scripted::boxed(vec![])).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidState { .. }));
        Ok(())
    }

    #[test]
    fn direct_read_ends_with_source() -> Result<(), CaptureError> {
        let mut handle =
            CaptureHandle::from_source(Scripted::boxed(vec![Ok(gray(1))]), direct_config())?;
        assert_eq!(handle.read(), Some(gray(1)));
        assert_eq!(handle.state(), LifecycleState::Open);
        assert!(handle.read().is_none());
        assert_eq!(handle.state(), LifecycleState::Released);
        Ok(())
    }

    #[test]
    fn grab_stashes_for_retrieve() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::from_source(
            Scripted::boxed(vec![Ok(gray(1)), Ok(gray(2))]),
            direct_config(),
        )?;
        assert!(handle.grab());
        assert!(handle.grab());
        assert_eq!(handle.position(), 0);
        assert_eq!(handle.retrieve(), Some(gray(1)));
        assert_eq!(handle.retrieve(), Some(gray(2)));
        assert_eq!(handle.position(), 2);
        Ok(())
    }

    #[test]
    fn position_drives_synthetic_timestamp() -> Result<(), CaptureError> {
        let frames = (0..5).map(|v| Ok(gray(v))).collect();
        let mut handle = CaptureHandle::from_source(Scripted::boxed(frames), direct_config())?;
        for _ in 0..5 {
            handle.read();
        }
        assert_eq!(handle.get(Property::Position), 5.0);
        assert_eq!(handle.get(Property::PositionMsec), 500.0);

        handle.set(Property::PositionMsec, 200.0)?;
        assert_eq!(handle.get(Property::Position), 2.0);
        Ok(())
    }

    #[test]
    fn frame_count_defaults_to_produced_and_can_be_overridden() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::from_source(
            Scripted::boxed(vec![Ok(gray(1)), Err(GrabError::NoFrame("x".into()))]),
            direct_config(),
        )?;
        handle.read();
        handle.read();
        assert_eq!(handle.get(Property::FrameCount), 1.0);
        handle.set(Property::FrameCount, 100.0)?;
        assert_eq!(handle.get(Property::FrameCount), 100.0);
        Ok(())
    }

    #[test]
    fn geometry_is_locked_in_threaded_mode() -> Result<(), CaptureError> {
        let config = CaptureConfig {
            multithreading: true,
            ..direct_config()
        };
        let mut handle = CaptureHandle::from_source(Scripted::boxed(vec![]), config)?;
        assert!(matches!(
            handle.set(Property::Width, 64.0),
            Err(CaptureError::PropertyLocked(Property::Width))
        ));
        assert!(handle.set(Property::Fps, 5.0).is_ok());
        Ok(())
    }

    #[test]
    fn direct_mode_resizes_blank_frames_after_set() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::from_source(
            Scripted::boxed(vec![Err(GrabError::NoFrame("x".into()))]),
            direct_config(),
        )?;
        handle.set(Property::Width, 4.0)?;
        handle.set(Property::Height, 3.0)?;
        let frame = handle.read().expect("substituted frame");
        assert_eq!(frame.dimensions(), (4, 3));
        assert!(frame.is_blank());
        Ok(())
    }

    #[test]
    fn rejects_bad_property_values() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::new(direct_config())?;
        assert!(handle.set(Property::Fps, 0.0).is_err());
        assert!(handle.set(Property::Width, -1.0).is_err());
        assert!(handle.set(Property::Position, f64::NAN).is_err());
        Ok(())
    }

    #[test]
    fn huge_positions_are_rejected_or_saturate() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::new(direct_config())?;
        assert!(matches!(
            handle.set(Property::PositionMsec, 1e19),
            Err(CaptureError::InvalidValue {
                property: Property::PositionMsec,
                ..
            })
        ));
        assert!(handle.set(Property::Position, 1e20).is_err());

        handle.set(Property::Position, 1e17)?;
        assert_eq!(handle.position_msec(), 10_000_000_000_000_000_000);
        handle.set(Property::Position, 1e18)?;
        assert_eq!(handle.get(Property::PositionMsec), u64::MAX as f64);
        Ok(())
    }

    #[test]
    fn missed_grab_without_substitution_keeps_position() -> Result<(), CaptureError> {
        let config = CaptureConfig {
            substitute_missing: false,
            max_grab_failures: u32::MAX,
            ..direct_config()
        };
        let miss = || Err(GrabError::NoFrame("timeout".into()));
        let mut handle = CaptureHandle::from_source(
            Scripted::boxed(vec![miss(), miss(), Ok(gray(3)), miss()]),
            config,
        )?;
        assert!(!handle.grab());
        assert!(handle.read().is_none());
        assert_eq!(handle.state(), LifecycleState::Open);
        assert_eq!(handle.position(), 0);

        assert!(handle.grab());
        assert_eq!(handle.retrieve(), Some(gray(3)));
        assert!(!handle.grab());
        assert_eq!(handle.position(), 1);
        assert_eq!(handle.stats().substituted, 0);
        Ok(())
    }

    #[test]
    fn release_of_closed_handle_is_immediate() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::new(direct_config())?;
        assert!(handle.release(false));
        assert_eq!(handle.state(), LifecycleState::Released);
        Ok(())
    }

    #[test]
    fn non_forced_release_drains_stashed_frame() -> Result<(), CaptureError> {
        let mut handle = CaptureHandle::from_source(
            Scripted::boxed(vec![Ok(gray(7)), Ok(gray(8))]),
            direct_config(),
        )?;
        assert!(handle.grab());
        assert!(!handle.release(false));
        assert_eq!(handle.state(), LifecycleState::Draining);
        assert_eq!(handle.read(), Some(gray(7)));
        assert_eq!(handle.state(), LifecycleState::Released);
        assert!(handle.read().is_none());
        Ok(())
    }

    #[test]
    fn invalid_config_is_an_open_error() {
        let config = CaptureConfig {
            queue_size: 0,
            ..direct_config()
        };
        assert!(matches!(
            CaptureHandle::new(config),
            Err(CaptureError::Open(OpenError::InvalidConfig(_)))
        ));
    }
}
