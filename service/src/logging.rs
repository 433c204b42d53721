use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};

/// Transport-stack modules that flood the console with per-frame and per-request
/// records. Hidden unless the level is Trace.
const FILTERED_MODULES: &[&str] = &[
    "tower",
    "tracing",
    "hyper",
    "axum",
    "tungstenite",
    "tokio_tungstenite",
];

pub struct Logger {}

impl Logger {
    /// Initializes the global terminal logger from the configured level.
    ///
    /// Connection lifecycle and dispatch records from our own crates always
    /// pass through; dependency noise only shows at Trace.
    pub fn init_logger(config: &Config) {
        let level = config.log_level_filter;
        let log_config = Self::build_log_config(level != LevelFilter::Trace);

        simplelog::TermLogger::init(
            Self::to_simplelog(level),
            log_config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
        .expect("Failed to start simplelog");
    }

    fn to_simplelog(level: LevelFilter) -> simplelog::LevelFilter {
        match level {
            LevelFilter::Off => simplelog::LevelFilter::Off,
            LevelFilter::Error => simplelog::LevelFilter::Error,
            LevelFilter::Warn => simplelog::LevelFilter::Warn,
            LevelFilter::Info => simplelog::LevelFilter::Info,
            LevelFilter::Debug => simplelog::LevelFilter::Debug,
            LevelFilter::Trace => simplelog::LevelFilter::Trace,
        }
    }

    fn build_log_config(filter_dependencies: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if filter_dependencies {
            for &module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
