//! Shared tracing bootstrap for the Uppe binaries.

mod subscriber;

pub use subscriber::{init_tracing, parse_level};
pub use tracing::level_filters::LevelFilter;
