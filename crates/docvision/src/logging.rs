//! Logging setup for the CLI.
//!
//! Extraction results are the only thing written to stdout, so every log line
//! goes to stderr. Our own crates log at the configured level while HTTP and
//! TLS internals stay at `warn`.

use docvision_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CRATES: [&str; 2] = ["docvision", "docvision_core"];

/// Initialize logging from the `[logging]` section of the active config.
///
/// `--verbose` forces `debug` and `--json-logs` forces JSON output. RUST_LOG,
/// when set, replaces the computed filter entirely.
pub fn init_from_config(config: &Config, verbose: bool, json_logs: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let json = json_logs || config.logging.format == "json";

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Filter directive scoping `level` to the DocVision crates.
fn filter_directive(level: &str) -> String {
    let level = match level.trim().to_ascii_lowercase().as_str() {
        l @ ("error" | "warn" | "info" | "debug" | "trace") => l.to_string(),
        _ => "info".to_string(),
    };
    let mut directive = String::from("warn");
    for krate in CRATES {
        directive.push_str(&format!(",{krate}={level}"));
    }
    directive
}
