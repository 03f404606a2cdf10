use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use tokio::signal;

use wakelag::ProbeEngine;
use wakelag::report;
use wakelag::settings::{Opt, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if opt.verbose { "info" } else { "warn" }),
    )
    .init();

    let settings = Settings::new()?;
    let config = settings.resolve(&opt);

    println!(
        "{} cycles - {}ms sleep period - {} buffers per cycle - pool {} - continuous pressure {}",
        config.cycles, config.period_ms, config.buffers, config.use_pool, config.continuous_pressure
    );

    let engine = ProbeEngine::new(config.clone());

    let run_report = tokio::select! {
        run_report = engine.run() => run_report?,
        _ = signal::ctrl_c() => {
            info!("Interrupted before completion; discarding run");
            std::process::exit(0);
        }
    };

    report::print_summary(&run_report);

    if let Some(path) = &config.output {
        match report::export(path, &run_report) {
            Ok(()) => info!("Results written to {}", path.display()),
            Err(e) => warn!("Failed to export results: {e:#}"),
        }
    }

    Ok(())
}
