//! Logging setup for the command-line entry point.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary (or to tests that want to see output).

use std::str::FromStr;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

/// Parses a level name, falling back to `INFO`.
#[must_use]
pub fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(Level::INFO)
}

/// Builds the filter: `RUST_LOG` when set, otherwise `level` for this crate
/// with the HTTP stack quietened.
fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("buildwright={level},h2=warn,hyper=warn,reqwest=warn"))
    })
}

/// Installs the global subscriber, writing to stderr. Later calls are no-ops.
pub fn init_logging(format: LogFormat, level: Level) {
    INIT.call_once(|| {
        let filter = build_filter(level);
        let registry = tracing_subscriber::registry().with(filter);
        // try_init: a test harness may already have installed a subscriber.
        let _ = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init(),
        };
    });
}
