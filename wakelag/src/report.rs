//! Report emitter: console summary plus text/JSON export.
//!
//! Everything here consumes results the sampler has already finished
//! producing; a failed export is reported to the caller but never
//! invalidates the in-memory measurements.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::heap::HeapStats;
use crate::pressure::PoolStats;
use crate::sampler::LatencySampler;
use crate::settings::ProbeConfig;
use crate::stats::LatencyStats;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencySummary {
    pub cycles: u64,
    pub worst_ns: i64,
    pub best_ns: i64,
    pub average_ns: i64,
}

impl LatencySummary {
    fn from_stats(stats: &LatencyStats) -> Option<Self> {
        Some(Self {
            cycles: stats.count(),
            worst_ns: stats.worst_ns()?,
            best_ns: stats.best_ns()?,
            average_ns: stats.average_ns()?,
        })
    }
}

/// Everything a completed run reports.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub config: ProbeConfig,
    pub summary: Option<LatencySummary>,
    pub samples_ns: Vec<i64>,
    pub heap: HeapStats,
    pub pool: Option<PoolStats>,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Local>,
        config: &ProbeConfig,
        sampler: LatencySampler,
        pool: Option<PoolStats>,
        heap: HeapStats,
    ) -> Self {
        let (samples_ns, stats) = sampler.into_parts();
        Self {
            started_at: started_at.to_rfc3339(),
            config: config.clone(),
            summary: LatencySummary::from_stats(&stats),
            samples_ns,
            heap,
            pool,
        }
    }
}

pub fn print_summary(report: &RunReport) {
    match &report.summary {
        Some(summary) => println!(
            "Latency: [avg {} µs, best {} µs, worst {} µs]",
            summary.average_ns / 1_000,
            summary.best_ns / 1_000,
            summary.worst_ns / 1_000
        ),
        None => println!("Latency: no samples recorded"),
    }

    let heap = &report.heap;
    println!("\nHeap stats:");
    println!("\tAllocations {} ({} freed)", heap.alloc_calls, heap.dealloc_calls);
    println!(
        "\tAllocated bytes {} ({} freed)",
        heap.alloc_bytes, heap.dealloc_bytes
    );
    if let Some(resident) = heap.resident_bytes {
        println!("\tResident set {} KiB", resident / 1024);
    }
    if let (Some(minor), Some(major)) = (heap.minor_faults, heap.major_faults) {
        println!("\tPage faults {minor} minor / {major} major");
    }

    if let Some(pool) = &report.pool {
        println!("\nPool stats:");
        println!("\tFresh allocations {}", pool.fresh_allocations);
        println!("\tReuses {} (ratio {:.2})", pool.reuses, pool.reuse_ratio());
        println!("\tIdle buffers {}", pool.idle);
    }

    if report.config.verbose && !report.samples_ns.is_empty() {
        let series: Vec<String> = report.samples_ns.iter().map(|ns| format_us(*ns)).collect();
        println!("\nLatencies (µs): [{}]", series.join(", "));
    }
}

/// Writes the deviation series, one microsecond value per line.
pub fn store_series(path: &Path, samples_ns: &[i64]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for ns in samples_ns {
        writeln!(writer, "{}", format_us(*ns))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn store_json(path: &Path, report: &RunReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("failed to encode report to {}", path.display()))?;
    Ok(())
}

/// Dispatches on the output path: `.json` gets the whole report, anything
/// else the plain series.
pub fn export(path: &Path, report: &RunReport) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => store_json(path, report),
        _ => store_series(path, &report.samples_ns),
    }
}

fn format_us(ns: i64) -> String {
    format!("{:.3}", ns as f64 / 1_000.0)
}
