use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use super::Message;

/// Free list of fixed-size buffers.
///
/// `acquire` pops the free list or allocates fresh when it is empty;
/// `release` pushes a buffer back for reuse. The pool is unbounded:
/// buffers that are never released simply stay with the allocator. A plain
/// mutex guards the free list since only the generator thread touches it.
pub struct BufferPool {
    buffer_size: usize,
    free: Mutex<Vec<Message>>,
    fresh: AtomicU64,
    reused: AtomicU64,
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            free: Mutex::new(Vec::new()),
            fresh: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    pub fn acquire(&self) -> Message {
        match self.free.lock().pop() {
            Some(buffer) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buffer
            }
            None => {
                self.fresh.fetch_add(1, Ordering::Relaxed);
                vec![0; self.buffer_size]
            }
        }
    }

    pub fn release(&self, message: Message) {
        debug_assert_eq!(message.len(), self.buffer_size);
        self.free.lock().push(message);
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            fresh_allocations: self.fresh.load(Ordering::Relaxed),
            reuses: self.reused.load(Ordering::Relaxed),
            idle: self.free.lock().len() as u64,
        }
    }
}

/// Counters describing how much recycling the pool achieved.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    pub fresh_allocations: u64,
    pub reuses: u64,
    pub idle: u64,
}

impl PoolStats {
    /// Share of acquisitions served from the free list (0.0 - 1.0).
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.fresh_allocations + self.reuses;
        if total == 0 {
            0.0
        } else {
            self.reuses as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_allocates_fresh_when_empty() {
        let pool = BufferPool::new(64);
        let buffer = pool.acquire();

        assert_eq!(buffer.len(), 64);
        let stats = pool.stats();
        assert_eq!(stats.fresh_allocations, 1);
        assert_eq!(stats.reuses, 0);
    }

    #[test]
    fn released_buffers_are_reused() {
        let pool = BufferPool::new(64);
        let buffer = pool.acquire();
        pool.release(buffer);

        let recycled = pool.acquire();
        assert_eq!(recycled.len(), 64);

        let stats = pool.stats();
        assert_eq!(stats.fresh_allocations, 1);
        assert_eq!(stats.reuses, 1);
        assert_eq!(stats.idle, 0);
        assert!(stats.reuse_ratio() > 0.0);
    }

    #[test]
    fn idle_counts_parked_buffers() {
        let pool = BufferPool::new(16);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        pool.release(b);

        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn reuse_ratio_of_untouched_pool_is_zero() {
        let pool = BufferPool::new(16);
        assert_eq!(pool.stats().reuse_ratio(), 0.0);
    }
}
