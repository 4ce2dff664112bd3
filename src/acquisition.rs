//! Background acquisition thread.
//!
//! The loop owns the frame source for as long as it runs. It grabs while the
//! buffer has room, backs off while it is full, and on exit closes the source
//! and the buffer's input side. Frames already buffered stay readable.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::buffer::BoundedFrameBuffer;
use crate::conditioner::{Conditioned, FrameConditioner};
use crate::ingest::{FrameSource, OpenError};

/// State shared between the acquisition thread and the capture handle.
pub(crate) struct Shared {
    pub(crate) buffer: BoundedFrameBuffer,
    stop: AtomicBool,
    finished: AtomicBool,
    produced: AtomicU64,
    substituted: AtomicU64,
}

impl Shared {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: BoundedFrameBuffer::new(capacity),
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            produced: AtomicU64::new(0),
            substituted: AtomicU64::new(0),
        }
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

pub(crate) struct AcquisitionLoop {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl AcquisitionLoop {
    /// Start the thread. The source is moved in and closed by the thread itself.
    pub(crate) fn spawn(
        source: Box<dyn FrameSource>,
        conditioner: FrameConditioner,
        capacity: usize,
        backoff: Duration,
    ) -> Result<Self, OpenError> {
        let shared = Arc::new(Shared::new(capacity));
        let device = source.describe();
        let thread = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("acquisition".to_string())
                .spawn(move || run(source, conditioner, &shared, backoff))
                .map_err(|err| OpenError::OpenFailed {
                    device,
                    reason: format!("spawn acquisition thread: {err}"),
                })?
        };
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub(crate) fn buffer(&self) -> &BoundedFrameBuffer {
        &self.shared.buffer
    }

    /// Ask the thread to stop and refuse any further frames.
    pub(crate) fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.buffer.close_input();
    }

    /// True once the thread has closed the source.
    pub(crate) fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn frames_produced(&self) -> u64 {
        self.shared.produced.load(Ordering::SeqCst)
    }

    pub(crate) fn frames_substituted(&self) -> u64 {
        self.shared.substituted.load(Ordering::SeqCst)
    }

    /// Wait for the thread to exit. Only returns once the source is closed.
    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("AcquisitionLoop: acquisition thread panicked");
            }
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}

fn run(
    mut source: Box<dyn FrameSource>,
    mut conditioner: FrameConditioner,
    shared: &Shared,
    backoff: Duration,
) {
    let device = source.describe();
    log::info!("AcquisitionLoop: started on {}", device);

    while !shared.should_stop() && source.is_open() {
        if shared.buffer.is_full() {
            std::thread::sleep(backoff);
            continue;
        }

        let frame = match conditioner.condition(source.grab()) {
            Conditioned::Fresh(frame) => {
                shared.produced.fetch_add(1, Ordering::SeqCst);
                frame
            }
            Conditioned::Substituted(frame) => {
                shared.substituted.fetch_add(1, Ordering::SeqCst);
                frame
            }
            Conditioned::Missed => continue,
            Conditioned::Ended(err) => {
                log::info!("AcquisitionLoop: {}", err);
                break;
            }
        };

        if !shared
            .buffer
            .put_with_backoff(frame, backoff, || !shared.should_stop())
        {
            break;
        }
    }

    source.close();
    shared.buffer.close_input();
    shared.finished.store(true, Ordering::SeqCst);
    log::info!(
        "AcquisitionLoop: stopped on {} ({} frames, {} substituted, {} buffered)",
        device,
        conditioner.fresh_frames(),
        conditioner.substitutions(),
        shared.buffer.size()
    );
}
