use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use uppe_watch::config::{Config, default_config_path};

/// Local endpoint health monitor.
///
/// Reads `add <uri>`, `del <uri>`, `ls` and `q` from stdin while probing the
/// registered URIs in the background.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Load settings from a TOML file, created with defaults if missing.
    /// Without a value, $XDG_CONFIG_HOME/uppe/watch.toml is used.
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    config: Option<Option<PathBuf>>,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        None => None,
        Some(Some(path)) => Some(path),
        Some(None) => Some(default_config_path()?),
    };
    let config = Config::from_config(config_path.as_deref()).context("failed to load configuration")?;

    logger::init_tracing(logger::parse_level(&config.logging.level));

    if cli.show_config {
        print!("{config}");
        return Ok(());
    }

    uppe_watch::app::run(config).await?;

    // A pending stdin read would otherwise hold the runtime open on Ctrl-C.
    std::process::exit(0);
}
