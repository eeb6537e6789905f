//! Concurrency limiter shared by all fetch tasks.
//!
//! Wraps a tokio semaphore. A task holds a `LimiterPermit` while its fetch is in
//! flight; dropping the permit (on success, failure, panic or abort) frees the slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default cap on simultaneous fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 50;

/// Counting limiter. Cheap to clone; clones share the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    semaphore: Arc<Semaphore>,
    max: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyLimiter {
    /// Limiter with `max` slots (at least 1).
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(max)),
                max,
                in_use: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> LimiterPermit {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("limiter semaphore is never closed"));
        let now = self.inner.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);
        LimiterPermit {
            _permit: permit,
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn max(&self) -> usize {
        self.inner.max
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Highest number of slots held at once since creation.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// Releases its slot when dropped.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    inner: Arc<Inner>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}
