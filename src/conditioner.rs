//! Post-processing and last-frame substitution.
//!
//! `FrameConditioner` lives with whichever context acquires frames: the
//! acquisition thread in threaded mode, the caller otherwise. It is never shared.

use crate::config::CaptureConfig;
use crate::frame::{Flip, Frame};
use crate::ingest::GrabError;

/// Result of conditioning one grab attempt.
#[derive(Debug)]
pub(crate) enum Conditioned {
    /// Freshly grabbed and post-processed.
    Fresh(Frame),
    /// Grab failed transiently; cached or blank frame stands in.
    Substituted(Frame),
    /// Grab failed transiently and substitution is off.
    Missed,
    /// Source ended, or the failure budget ran out.
    Ended(GrabError),
}

pub(crate) struct FrameConditioner {
    width: u32,
    height: u32,
    channels: u8,
    force_resize: bool,
    flip: Option<Flip>,
    max_failures: u32,
    substitute_missing: bool,
    last_frame: Option<Frame>,
    consecutive_failures: u32,
    fresh_frames: u64,
    substitutions: u64,
}

impl FrameConditioner {
    pub(crate) fn new(config: &CaptureConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            channels: config.channels,
            force_resize: config.force_resize,
            flip: config.flip(),
            max_failures: config.max_grab_failures,
            substitute_missing: config.substitute_missing,
            last_frame: None,
            consecutive_failures: 0,
            fresh_frames: 0,
            substitutions: 0,
        }
    }

    pub(crate) fn set_target(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub(crate) fn fresh_frames(&self) -> u64 {
        self.fresh_frames
    }

    pub(crate) fn substitutions(&self) -> u64 {
        self.substitutions
    }

    pub(crate) fn condition(&mut self, grabbed: Result<Frame, GrabError>) -> Conditioned {
        match grabbed {
            Ok(frame) => {
                self.consecutive_failures = 0;
                self.fresh_frames += 1;
                let frame = self.post_process(frame);
                self.last_frame = Some(frame.clone());
                Conditioned::Fresh(frame)
            }
            Err(err @ GrabError::Ended(_)) => Conditioned::Ended(err),
            Err(GrabError::NoFrame(reason)) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.max_failures {
                    return Conditioned::Ended(GrabError::Ended(format!(
                        "{} consecutive grab failures, last: {}",
                        self.consecutive_failures, reason
                    )));
                }
                if !self.substitute_missing {
                    log::debug!("FrameConditioner: no frame: {}", reason);
                    return Conditioned::Missed;
                }
                log::warn!("FrameConditioner: frame not grabbed: {}", reason);
                self.substitutions += 1;
                Conditioned::Substituted(self.substitute())
            }
        }
    }

    /// Last good frame, or a blank frame of the target geometry before the first one.
    pub(crate) fn substitute(&self) -> Frame {
        match &self.last_frame {
            Some(frame) => {
                log::debug!("FrameConditioner: repeating last frame");
                frame.clone()
            }
            None => {
                log::debug!(
                    "FrameConditioner: no cached frame yet, substituting blank {}x{}",
                    self.width,
                    self.height
                );
                Frame::zeroed(self.width, self.height, self.channels)
            }
        }
    }

    fn post_process(&self, frame: Frame) -> Frame {
        let frame = if self.force_resize {
            match frame.resized_area(self.width, self.height) {
                Ok(resized) => resized,
                Err(err) => {
                    log::warn!(
                        "FrameConditioner: resize to {}x{} failed: {}",
                        self.width,
                        self.height,
                        err
                    );
                    frame
                }
            }
        } else {
            frame
        };
        match self.flip {
            Some(flip) => frame.flipped(flip),
            None => frame,
        }
    }
}
