//! Allocation-pressure generator.
//!
//! One generator serves both pressure modes: burst mode installs a single
//! batch per sampling cycle (driven by the sampler, before each sleep), and
//! continuous mode loops batches on a detached thread so the churn overlaps
//! the sleep/wakeup window itself.

use std::sync::Arc;
use std::thread;

use log::info;

use super::{BufferPool, Message, Ring};

pub struct PressureGenerator {
    ring: Ring,
    pool: Option<Arc<BufferPool>>,
    buffer_size: usize,
    batch: usize,
}

impl PressureGenerator {
    pub fn new(ring: Ring, pool: Option<Arc<BufferPool>>, buffer_size: usize, batch: usize) -> Self {
        Self {
            ring,
            pool,
            buffer_size,
            batch,
        }
    }

    /// Installs one batch of freshly filled buffers into successive slots.
    ///
    /// With a pool, displaced occupants go back to the free list as they are
    /// overwritten, and the batch's own buffers follow at the end of the
    /// batch (generate-then-discard). Without a pool, displaced buffers are
    /// simply dropped for the allocator to reclaim.
    pub fn install_batch(&mut self) {
        let first = self.ring.cursor();

        for seq in 0..self.batch {
            let mut message = self.next_message();
            fill(&mut message, seq);

            let displaced = self.ring.install(message);
            if let (Some(pool), Some(old)) = (self.pool.as_deref(), displaced) {
                pool.release(old);
            }
        }

        if let Some(pool) = self.pool.as_deref() {
            let capacity = self.ring.capacity() as u64;
            for written in first..self.ring.cursor() {
                if let Some(message) = self.ring.evict((written % capacity) as usize) {
                    pool.release(message);
                }
            }
        }
    }

    /// Detaches the generator onto its own thread, looping as fast as
    /// possible.
    ///
    /// Fire-and-abandon: the thread is never joined or cancelled and is torn
    /// down by process exit. The only lock it ever takes is the pool's
    /// internal free-list guard, which the sampler never touches, so it
    /// cannot block completion.
    pub fn spawn_continuous(mut self) {
        thread::spawn(move || {
            info!("continuous pressure thread started");
            loop {
                self.install_batch();
            }
        });
    }

    /// Total number of buffers installed so far.
    pub fn installed(&self) -> u64 {
        self.ring.cursor()
    }

    fn next_message(&self) -> Message {
        match self.pool.as_deref() {
            Some(pool) => pool.acquire(),
            None => vec![0; self.buffer_size],
        }
    }
}

/// Deterministic fill, varied per batch position so the write is not dead.
fn fill(message: &mut Message, seq: usize) {
    for (i, byte) in message.iter_mut().enumerate() {
        *byte = (i ^ seq) as u8;
    }
}
