use std::env::var;
use std::io::stderr;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `level` is the default directive; `RUST_LOG` still overrides it. Events go
/// to stderr so that anything a binary prints on stdout stays uninterleaved.
/// `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(stderr)
            .with_filter(env_filter)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_err() {
        warn!("Tracing subscriber already installed, keeping the existing one");
    }
}

/// Parse a textual level such as `"debug"`, falling back to `INFO`.
pub fn parse_level(raw: &str) -> LevelFilter {
    raw.parse().unwrap_or(LevelFilter::INFO)
}
