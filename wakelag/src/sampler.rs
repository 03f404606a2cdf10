//! Wakeup-latency sampler.
//!
//! The timekeeper of a run: sleeps for the configured period, measures how
//! far the actual wakeup lands from the ideal one, and repeats for the
//! configured number of cycles. The sleep is the single suspension point;
//! everything else is non-blocking bookkeeping.

use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::pressure::PressureGenerator;
use crate::stats::LatencyStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    NotStarted,
    Running,
    Completed,
}

pub struct LatencySampler {
    cycles: u64,
    period: Duration,
    state: SamplerState,
    samples_ns: Vec<i64>,
    stats: LatencyStats,
}

impl LatencySampler {
    pub fn new(cycles: u64, period_ms: u64) -> Self {
        Self {
            cycles,
            period: Duration::from_millis(period_ms),
            state: SamplerState::NotStarted,
            samples_ns: Vec::with_capacity(cycles as usize),
            stats: LatencyStats::new(),
        }
    }

    /// Runs the full sleep/measure loop on the calling thread.
    ///
    /// When `burst` is present the generator installs one batch before each
    /// sleep (synchronous pressure); overlap with the sleep itself requires
    /// the generator's continuous mode instead. The completed-cycle count is
    /// published through `cycle_signal` after every measurement, and reaches
    /// `cycles` exactly when the state transitions to `Completed`.
    /// `thread::sleep` has no error path; a shorter-than-requested sleep
    /// would surface as a negative deviation rather than a failure.
    pub fn run(&mut self, mut burst: Option<&mut PressureGenerator>, cycle_signal: &watch::Sender<u64>) {
        self.state = SamplerState::Running;

        for cycle in 0..self.cycles {
            if let Some(generator) = burst.as_deref_mut() {
                generator.install_batch();
            }

            let start = Instant::now();
            thread::sleep(self.period);
            let wakeup = Instant::now();

            let ideal = start + self.period;
            let deviation_ns = signed_delta_ns(wakeup, ideal);

            self.samples_ns.push(deviation_ns);
            self.stats.record(deviation_ns);

            cycle_signal.send_replace(cycle + 1);
        }

        self.state = SamplerState::Completed;
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == SamplerState::Completed
    }

    pub fn samples_ns(&self) -> &[i64] {
        &self.samples_ns
    }

    pub fn stats(&self) -> &LatencyStats {
        &self.stats
    }

    pub fn into_parts(self) -> (Vec<i64>, LatencyStats) {
        (self.samples_ns, self.stats)
    }
}

/// Signed `actual - ideal` in nanoseconds; negative when the wakeup landed
/// early.
fn signed_delta_ns(actual: Instant, ideal: Instant) -> i64 {
    match actual.checked_duration_since(ideal) {
        Some(late) => late.as_nanos() as i64,
        None => -(ideal.duration_since(actual).as_nanos() as i64),
    }
}
