//! scoop - aggregates the flavors offered by every discovered ice cream shop

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scoop::{Daemon, config::Config};

mod logging;

use logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "scoop")]
#[command(about = "Serve the union of flavors offered by every discovered shop")]
#[command(after_help = "\
EXAMPLES:
  scoop --discovery-url http://localhost:8080/shops
  scoop --discovery-url http://localhost:8080/shops --bind 127.0.0.1:9000
  scoop --config scoop.toml")]
struct Cli {
  /// URL listing the shops as `name,url` records, one per line
  #[arg(long, env = "SCOOP_DISCOVERY_URL")]
  discovery_url: Option<String>,

  /// Address for the flavors endpoint, `host:port` or `:port` (default: :8081)
  #[arg(long, alias = "port")]
  bind: Option<String>,

  /// TOML config file; flags take precedence over its values
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Seconds between refresh cycles (default: 10)
  #[arg(long, value_name = "SECS")]
  refresh_interval: Option<u64>,

  /// Log level (error, warn, info, debug, trace)
  #[arg(long)]
  log: Option<String>,
}

impl Cli {
  /// Load the config file if one was given and apply flag overrides on top.
  fn into_config(self) -> Result<Config> {
    let mut config = match &self.config {
      Some(path) => Config::load(path)?,
      None => Config::default(),
    };

    if let Some(url) = self.discovery_url {
      config.discovery.url = Some(url);
    }
    if let Some(bind) = self.bind {
      config.server.bind = bind;
    }
    if let Some(secs) = self.refresh_interval {
      config.refresh.interval_secs = secs;
    }
    if let Some(level) = self.log {
      config.logging.level = level;
    }

    Ok(config)
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let config = cli.into_config()?;

  let _guard = init_logging(&config.logging);

  let daemon = Daemon::new(config).context("Bad args")?;
  daemon.run().await?;
  Ok(())
}
