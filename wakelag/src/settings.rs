use std::path::PathBuf;

use clap::Parser;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

const DEFAULT_CYCLES: u64 = 500;
const DEFAULT_PERIOD_MS: u64 = 100;
const DEFAULT_BUFFERS: usize = 10;
const DEFAULT_BUFFER_SIZE: usize = 40960;
const DEFAULT_WINDOW_SIZE: usize = 200_000;

/// Command-line flags. Every flag overrides the corresponding `WAKELAG_*`
/// environment setting.
#[derive(Debug, Parser)]
#[command(name = "wakelag", about = "Wakeup-latency probe under allocation pressure")]
pub struct Opt {
    /// Number of sampling cycles
    #[clap(short, long)]
    pub cycles: Option<u64>,

    /// Sleeping period in milliseconds
    #[clap(short, long)]
    pub period: Option<u64>,

    /// Buffers installed per cycle
    #[clap(short, long)]
    pub buffers: Option<usize>,

    /// Bytes per buffer
    #[clap(long)]
    pub buffer_size: Option<usize>,

    /// Ring capacity in slots
    #[clap(long)]
    pub window_size: Option<usize>,

    /// Recycle buffers through a pool instead of allocating fresh
    #[clap(long)]
    pub pool: bool,

    /// Run the pressure generator on its own thread so churn overlaps the
    /// sleeps
    #[clap(long)]
    pub continuous: bool,

    /// Log cycle progress during the run
    #[clap(long)]
    pub progress: bool,

    /// Write the deviation series (or a .json report) to this path
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Verbose output, including the full per-cycle series
    #[clap(short, long)]
    pub verbose: bool,
}

/// Environment-driven settings (`WAKELAG_CYCLES`, `WAKELAG_USE_POOL`, ...).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub cycles: Option<u64>,
    pub period: Option<u64>,
    pub buffers: Option<usize>,
    pub buffer_size: Option<usize>,
    pub window_size: Option<usize>,
    pub use_pool: Option<bool>,
    pub continuous_pressure: Option<bool>,
    pub progress: Option<bool>,
    pub output: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .add_source(Environment::with_prefix("WAKELAG").try_parsing(true))
            .build()?;

        s.try_deserialize()
    }

    /// Folds CLI flags over the environment layer over the defaults.
    pub fn resolve(self, opt: &Opt) -> ProbeConfig {
        ProbeConfig {
            cycles: opt.cycles.or(self.cycles).unwrap_or(DEFAULT_CYCLES),
            period_ms: opt.period.or(self.period).unwrap_or(DEFAULT_PERIOD_MS),
            buffers: opt.buffers.or(self.buffers).unwrap_or(DEFAULT_BUFFERS),
            buffer_size: opt
                .buffer_size
                .or(self.buffer_size)
                .unwrap_or(DEFAULT_BUFFER_SIZE),
            window_size: opt
                .window_size
                .or(self.window_size)
                .unwrap_or(DEFAULT_WINDOW_SIZE)
                .max(1),
            use_pool: opt.pool || self.use_pool.unwrap_or(false),
            continuous_pressure: opt.continuous || self.continuous_pressure.unwrap_or(false),
            progress: opt.progress || self.progress.unwrap_or(false),
            verbose: opt.verbose,
            output: opt.output.clone().or(self.output.map(PathBuf::from)),
        }
    }
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeConfig {
    pub cycles: u64,
    pub period_ms: u64,
    pub buffers: usize,
    pub buffer_size: usize,
    pub window_size: usize,
    pub use_pool: bool,
    pub continuous_pressure: bool,
    pub progress: bool,
    pub verbose: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn bare_opt() -> Opt {
        Opt::parse_from(["wakelag"])
    }

    #[test]
    #[serial]
    fn load_settings_from_env() {
        unsafe {
            std::env::set_var("WAKELAG_CYCLES", "42");
            std::env::set_var("WAKELAG_USE_POOL", "true");
        }

        let settings = Settings::new().expect("failed to load settings");

        assert_eq!(settings.cycles, Some(42));
        assert_eq!(settings.use_pool, Some(true));

        unsafe {
            std::env::remove_var("WAKELAG_CYCLES");
            std::env::remove_var("WAKELAG_USE_POOL");
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_nothing_is_set() {
        let config = Settings::default().resolve(&bare_opt());

        assert_eq!(config.cycles, DEFAULT_CYCLES);
        assert_eq!(config.period_ms, DEFAULT_PERIOD_MS);
        assert_eq!(config.buffers, DEFAULT_BUFFERS);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
        assert!(!config.use_pool);
        assert!(!config.continuous_pressure);
        assert!(config.output.is_none());
    }

    #[test]
    fn cli_overrides_environment_layer() {
        let opt = Opt::parse_from(["wakelag", "--cycles", "7", "--period", "5", "--pool"]);
        let settings = Settings {
            cycles: Some(99),
            period: Some(250),
            buffers: Some(3),
            ..Default::default()
        };

        let config = settings.resolve(&opt);

        assert_eq!(config.cycles, 7);
        assert_eq!(config.period_ms, 5);
        // No flag given: the environment layer wins.
        assert_eq!(config.buffers, 3);
        assert!(config.use_pool);
    }

    #[test]
    fn window_size_is_clamped_to_at_least_one_slot() {
        let settings = Settings {
            window_size: Some(0),
            ..Default::default()
        };

        assert_eq!(settings.resolve(&bare_opt()).window_size, 1);
    }

    #[test]
    fn output_path_falls_back_to_environment() {
        let settings = Settings {
            output: Some("run.txt".into()),
            ..Default::default()
        };

        let config = settings.resolve(&bare_opt());
        assert_eq!(config.output, Some(PathBuf::from("run.txt")));
    }
}
