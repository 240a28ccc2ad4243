//! Telemetry initialization.
//!
//! Events go to stderr so stdout stays reserved for command output.
//!
//! - `--debug` → `logshelf=debug,warn`
//! - otherwise `RUST_LOG` if set, else `warn`
//! - `LOGSHELF_LOG_JSON=1` → JSON events instead of the compact text format

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the JSON formatter.
pub const JSON_ENV: &str = "LOGSHELF_LOG_JSON";

/// Install the global subscriber. Later calls are no-ops.
pub fn init(debug: bool) {
    let filter = build_filter(debug);
    let json = std::env::var(JSON_ENV).is_ok_and(|v| is_truthy(&v));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}

fn build_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("logshelf=debug,warn");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["", "0", "false", "off", "json"] {
            assert!(!is_truthy(v), "{v}");
        }
    }
}
