//! Read-and-forward loop driving a `CaptureHandle`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::capture::{CaptureHandle, LifecycleState};
use crate::ui::Ui;

pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_secs(2);

/// Outcome of one `Relay::run`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaySummary {
    pub frames: u64,
    /// Frames delivered after the stop request, while draining.
    pub drained: u64,
    /// False when the drain window ran out and pending frames were discarded.
    pub drained_cleanly: bool,
}

pub struct Relay {
    handle: CaptureHandle,
    ui: Ui,
    drain_window: Duration,
}

impl Relay {
    pub fn new(handle: CaptureHandle, ui: Ui) -> Self {
        Self {
            handle,
            ui,
            drain_window: DEFAULT_DRAIN_WINDOW,
        }
    }

    pub fn with_drain_window(mut self, drain_window: Duration) -> Self {
        self.drain_window = drain_window;
        self
    }

    pub fn handle(&self) -> &CaptureHandle {
        &self.handle
    }

    /// Read until the source ends or `stop` is set, then release: gracefully
    /// first, forced if frames are still pending after the drain window.
    ///
    /// Direct (non-threaded) handles are paced at the configured frame period;
    /// threaded handles deliver as fast as frames are buffered.
    pub fn run(&mut self, stop: &AtomicBool) -> RelaySummary {
        let paced = !self.handle.is_threaded();
        let period = self.handle.config().period();
        let mut status = self.ui.status(self.handle.device());
        let mut frames = 0u64;

        while !stop.load(Ordering::SeqCst) {
            let started = Instant::now();
            match self.handle.read() {
                Some(_) => {
                    frames += 1;
                    status.update(frames, self.handle.buffered());
                }
                // Missed grab with substitution off.
                None if self.handle.state() == LifecycleState::Open => {}
                None => break,
            }

            if paced {
                if let Some(remaining) = period.checked_sub(started.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
        }

        let (drained, drained_cleanly) = self.shutdown();
        frames += drained;
        status.finish(frames);
        log::info!(
            "Relay: stopped after {} frame(s) ({} drained{})",
            frames,
            drained,
            if drained_cleanly {
                ""
            } else {
                ", remainder discarded"
            }
        );

        RelaySummary {
            frames,
            drained,
            drained_cleanly,
        }
    }

    fn shutdown(&mut self) -> (u64, bool) {
        if self.handle.state() == LifecycleState::Released || self.handle.release(false) {
            self.handle.release(true);
            return (0, true);
        }

        let deadline = Instant::now() + self.drain_window;
        let mut drained = 0u64;
        while self.handle.state() == LifecycleState::Draining && Instant::now() < deadline {
            match self.handle.read() {
                Some(_) => drained += 1,
                None => break,
            }
        }

        let clean = self.handle.state() == LifecycleState::Released;
        self.handle.release(true);
        (drained, clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;
    use crate::ingest::{parse_device_identifier, DeviceId};

    fn handle(device: &str, multithreading: bool) -> CaptureHandle {
        let config = CaptureConfig {
            width: 8,
            height: 6,
            fps: 1000,
            multithreading,
            ..CaptureConfig::default()
        };
        let device: DeviceId = parse_device_identifier(device);
        CaptureHandle::open_device(&device, config).unwrap()
    }

    #[test]
    fn direct_relay_runs_until_source_ends() {
        let mut relay = Relay::new(handle("stub://relay?frames=5", false), Ui::headless());
        let summary = relay.run(&AtomicBool::new(false));
        assert_eq!(summary.frames, 5);
        assert!(summary.drained_cleanly);
        assert_eq!(relay.handle().state(), LifecycleState::Released);
    }

    #[test]
    fn threaded_relay_delivers_every_frame() {
        let mut relay = Relay::new(handle("stub://relay?frames=12", true), Ui::headless());
        let summary = relay.run(&AtomicBool::new(false));
        assert_eq!(summary.frames, 12);
        assert_eq!(relay.handle().state(), LifecycleState::Released);
    }

    #[test]
    fn misses_are_not_counted_as_frames() {
        let config = CaptureConfig {
            width: 8,
            height: 6,
            fps: 1000,
            multithreading: false,
            substitute_missing: false,
            max_grab_failures: u32::MAX,
            ..CaptureConfig::default()
        };
        let device = parse_device_identifier("stub://relay?frames=6&fail_every=2");
        let handle = CaptureHandle::open_device(&device, config).unwrap();
        let mut relay = Relay::new(handle, Ui::headless());
        let summary = relay.run(&AtomicBool::new(false));
        assert_eq!(summary.frames, 6);
        assert_eq!(relay.handle().position(), 6);
        assert_eq!(relay.handle().stats().substituted, 0);
        assert_eq!(relay.handle().state(), LifecycleState::Released);
    }

    #[test]
    fn stop_flag_set_before_run_releases_immediately() {
        let mut relay = Relay::new(handle("stub://relay", false), Ui::headless());
        let summary = relay.run(&AtomicBool::new(true));
        assert_eq!(summary.frames, 0);
        assert_eq!(relay.handle().state(), LifecycleState::Released);
    }
}
