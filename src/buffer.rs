//! Bounded FIFO hand-off between the acquisition thread and the consumer.
//!
//! `BoundedFrameBuffer` is the only object shared across threads in the pipeline:
//! - `put` never blocks; it reports `false` when the buffer is full or closed
//! - `put_with_backoff` retries a full buffer with a fixed sleep between attempts
//! - `take` blocks until a frame arrives or the buffer is closed and empty
//!
//! Frames leave in the order they entered. Nothing is ever dropped to make room.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::frame::Frame;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default sleep between retries against a full buffer.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

struct Slots {
    queue: VecDeque<Frame>,
    input_closed: bool,
}

pub struct BoundedFrameBuffer {
    slots: Mutex<Slots>,
    not_empty: Condvar,
    capacity: usize,
}

impl BoundedFrameBuffer {
    /// Create a buffer holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Mutex::new(Slots {
                queue: VecDeque::with_capacity(capacity),
                input_closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue without blocking. Returns `false` if full or closed for input;
    /// the frame is dropped in that case and the caller decides whether to retry.
    pub fn put(&self, frame: Frame) -> bool {
        let mut slots = self.lock();
        if slots.input_closed || slots.queue.len() >= self.capacity {
            return false;
        }
        slots.queue.push_back(frame);
        drop(slots);
        self.not_empty.notify_one();
        true
    }

    /// Enqueue, sleeping `backoff` between attempts while the buffer is full.
    ///
    /// Gives up when the buffer is closed for input or `keep_going` returns false.
    /// Returns whether the frame was enqueued.
    pub fn put_with_backoff(
        &self,
        frame: Frame,
        backoff: Duration,
        mut keep_going: impl FnMut() -> bool,
    ) -> bool {
        loop {
            {
                let mut slots = self.lock();
                if slots.input_closed {
                    return false;
                }
                if slots.queue.len() < self.capacity {
                    slots.queue.push_back(frame);
                    drop(slots);
                    self.not_empty.notify_one();
                    return true;
                }
            }
            if !keep_going() {
                return false;
            }
            std::thread::sleep(backoff);
        }
    }

    /// Dequeue the oldest frame, blocking while empty.
    ///
    /// Returns `None` only when the buffer is empty and closed for input.
    pub fn take(&self) -> Option<Frame> {
        let mut slots = self.lock();
        loop {
            if let Some(frame) = slots.queue.pop_front() {
                return Some(frame);
            }
            if slots.input_closed {
                return None;
            }
            slots = self
                .not_empty
                .wait(slots)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Dequeue, waiting at most `timeout` for a frame to arrive.
    pub fn take_timeout(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut slots = self.lock();
        loop {
            if let Some(frame) = slots.queue.pop_front() {
                return Some(frame);
            }
            let now = Instant::now();
            if slots.input_closed || now >= deadline {
                return None;
            }
            let (guard, _) = self
                .not_empty
                .wait_timeout(slots, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots = guard;
        }
    }

    /// Dequeue without waiting.
    pub fn try_take(&self) -> Option<Frame> {
        self.lock().queue.pop_front()
    }

    pub fn size(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().queue.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reject further puts and wake any blocked `take`. Queued frames stay readable.
    pub fn close_input(&self) {
        self.lock().input_closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_input_closed(&self) -> bool {
        self.lock().input_closed
    }

    /// Discard all queued frames. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut slots = self.lock();
        let dropped = slots.queue.len();
        slots.queue.clear();
        dropped
    }

    // A panic while holding the lock cannot leave the queue half-updated, so the
    // poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BoundedFrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
