pub mod heap;
pub mod pressure;
pub mod report;
pub mod sampler;
pub mod settings;
pub mod stats;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use tokio::sync::watch;
use tokio::task;

use crate::pressure::{BufferPool, PressureGenerator, Ring};
use crate::report::RunReport;
use crate::sampler::LatencySampler;
use crate::settings::ProbeConfig;

const PROGRESS_LOG_EVERY: u64 = 50;

/// Wires the sampler, the pressure generator and the progress task together
/// for one bounded measurement run.
pub struct ProbeEngine {
    pub config: ProbeConfig,
}

impl ProbeEngine {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Runs the probe to completion and assembles the report.
    ///
    /// The sampler owns the authoritative cycle count: nothing is reported
    /// until it has completed. A continuous-mode generator thread is
    /// abandoned here and torn down by process exit.
    pub async fn run(self) -> Result<RunReport> {
        let config = self.config;
        let started_at = Local::now();

        heap::mark_baseline();

        let pool = config
            .use_pool
            .then(|| Arc::new(BufferPool::new(config.buffer_size)));
        let ring = Ring::with_capacity(config.window_size);
        let generator =
            PressureGenerator::new(ring, pool.clone(), config.buffer_size, config.buffers);

        let (cycle_tx, cycle_rx) = watch::channel(0u64);
        let progress = config
            .progress
            .then(|| spawn_progress_task(cycle_rx, config.cycles));

        let cycles = config.cycles;
        let period_ms = config.period_ms;
        let continuous = config.continuous_pressure;

        info!(
            "starting sampler: {} cycles, {}ms period, continuous pressure {}",
            cycles, period_ms, continuous
        );

        let sampler = task::spawn_blocking(move || {
            let mut sampler = LatencySampler::new(cycles, period_ms);
            let mut generator = generator;
            if continuous {
                generator.spawn_continuous();
                sampler.run(None, &cycle_tx);
            } else {
                sampler.run(Some(&mut generator), &cycle_tx);
            }
            sampler
        })
        .await
        .context("latency sampler thread panicked")?;

        if let Some(handle) = progress {
            // The task ends on its own once the sampler drops the sender.
            let _ = handle.await;
        }

        debug_assert!(sampler.is_completed());
        info!("sampler completed after {} cycles", cycles);

        let pool_stats = pool.as_deref().map(BufferPool::stats);
        Ok(RunReport::new(
            started_at,
            &config,
            sampler,
            pool_stats,
            heap::stats(),
        ))
    }
}

fn spawn_progress_task(mut cycle_rx: watch::Receiver<u64>, total: u64) -> task::JoinHandle<()> {
    task::spawn(async move {
        while cycle_rx.changed().await.is_ok() {
            let done = *cycle_rx.borrow_and_update();
            if done % PROGRESS_LOG_EVERY == 0 || done == total {
                info!("cycle {done}/{total}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn config(cycles: u64, period_ms: u64) -> ProbeConfig {
        ProbeConfig {
            cycles,
            period_ms,
            buffers: 5,
            buffer_size: 4096,
            window_size: 64,
            use_pool: false,
            continuous_pressure: false,
            progress: false,
            verbose: false,
            output: None,
        }
    }

    #[tokio::test]
    async fn bounded_run_produces_the_full_series() {
        let begin = Instant::now();
        let report = ProbeEngine::new(config(10, 50))
            .run()
            .await
            .expect("run failed");
        let elapsed = begin.elapsed();

        assert_eq!(report.samples_ns.len(), 10);
        let summary = report.summary.expect("non-empty run has a summary");
        assert_eq!(summary.cycles, 10);
        assert!(summary.best_ns <= summary.average_ns);
        assert!(summary.average_ns <= summary.worst_ns);

        // 10 cycles of 50ms sleep, with generous scheduling slack.
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn pooled_run_reports_pool_stats() {
        let mut cfg = config(3, 0);
        cfg.use_pool = true;

        let report = ProbeEngine::new(cfg).run().await.expect("run failed");

        let pool = report.pool.expect("pooled run reports pool stats");
        assert!(pool.reuse_ratio() > 0.0);
    }

    #[tokio::test]
    async fn unpooled_run_reports_no_pool_stats() {
        let report = ProbeEngine::new(config(2, 0))
            .run()
            .await
            .expect("run failed");

        assert!(report.pool.is_none());
    }

    #[tokio::test]
    async fn continuous_pressure_run_completes() {
        // Tiny buffers keep the abandoned generator thread cheap for the
        // rest of the test process.
        let cfg = ProbeConfig {
            cycles: 5,
            period_ms: 10,
            buffers: 2,
            buffer_size: 64,
            window_size: 8,
            use_pool: true,
            continuous_pressure: true,
            progress: false,
            verbose: false,
            output: None,
        };

        let report = ProbeEngine::new(cfg).run().await.expect("run failed");
        assert_eq!(report.samples_ns.len(), 5);
    }

    #[tokio::test]
    async fn progress_task_does_not_block_completion() {
        let mut cfg = config(3, 0);
        cfg.progress = true;

        let report = ProbeEngine::new(cfg).run().await.expect("run failed");
        assert_eq!(report.samples_ns.len(), 3);
    }
}
