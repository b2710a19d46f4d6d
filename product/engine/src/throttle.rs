use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Fixed-interval scheduler. [`Throttle::wait`] hands out a [`ThrottleSlot`];
/// the next slot opens `interval` after the previous one is dropped, so the
/// pause is measured from when the guarded work finished. The first slot
/// opens immediately.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_done: Mutex<Option<Instant>>,
}

/// Held for the duration of one throttled request. Concurrent callers queue
/// behind it.
#[must_use = "the slot is released as soon as it is dropped"]
#[derive(Debug)]
pub struct ThrottleSlot<'a> {
    last_done: MutexGuard<'a, Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_done: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Blocks until the next slot opens.
    pub fn wait(&self) -> ThrottleSlot<'_> {
        let last_done = match self.last_done.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(prev) = *last_done {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        ThrottleSlot { last_done }
    }
}

impl Drop for ThrottleSlot<'_> {
    fn drop(&mut self) {
        *self.last_done = Some(Instant::now());
    }
}
