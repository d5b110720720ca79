//! Configuration for the aggregation daemon.
//!
//! Values come from an optional TOML file and are then overridden by
//! command-line flags. Every section falls back to its defaults, so an empty
//! file is valid as long as the discovery URL is supplied some other way.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config file {path:?}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config file {path:?}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("discovery url not defined (pass --discovery-url or set [discovery] url)")]
  MissingDiscoveryUrl,
  #[error("Invalid bind address {addr:?}: {source}")]
  InvalidBind {
    addr: String,
    #[source]
    source: std::net::AddrParseError,
  },
  #[error("Invalid value for {field}: {reason}")]
  InvalidValue { field: &'static str, reason: &'static str },
}

// ============================================================================
// Discovery Configuration
// ============================================================================

/// Where the list of shops comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
  /// URL returning `name,endpoint` records, one per line (required)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

// ============================================================================
// Refresh Configuration
// ============================================================================

/// How the snapshot store treats a cycle that finishes after a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
  /// Writes from cycles older than the stored one are rejected
  #[default]
  Monotonic,
  /// Whichever cycle writes last wins, regardless of start order
  LastWriterWins,
}

/// Refresh cycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
  /// Seconds between cycle launches
  /// Default: 10
  pub interval_secs: u64,

  /// Per-request deadline in seconds for the discovery call and each shop call (0 = no deadline)
  /// Default: 5
  pub fetch_timeout_secs: u64,

  /// Maximum shop requests in flight within one cycle
  /// Default: 16
  pub max_concurrent_fetches: usize,

  /// Ordering policy for overlapping cycles
  /// Default: monotonic
  pub policy: PublishPolicy,

  /// Flavors served before the first cycle publishes
  pub initial_flavors: Vec<String>,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    Self {
      interval_secs: 10,
      fetch_timeout_secs: 5,
      max_concurrent_fetches: 16,
      policy: PublishPolicy::default(),
      initial_flavors: Vec::new(),
    }
  }
}

impl RefreshConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs)
  }

  pub fn fetch_timeout(&self) -> Option<Duration> {
    (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
  }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Publication listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Address to bind, either `host:port` or a bare `:port`
  /// Default: ":8081"
  pub bind: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: ":8081".to_string(),
    }
  }
}

impl ServerConfig {
  /// Resolve the bind string, treating a bare `:port` as all interfaces.
  pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
    let addr = if self.bind.starts_with(':') {
      format!("0.0.0.0{}", self.bind)
    } else {
      self.bind.clone()
    };

    addr.parse().map_err(|source| ConfigError::InvalidBind {
      addr: self.bind.clone(),
      source,
    })
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Log level: "error", "warn", "info", "debug", "trace"
  /// Default: "info"
  pub level: String,

  /// Write logs to this directory instead of the console
  #[serde(skip_serializing_if = "Option::is_none")]
  pub directory: Option<PathBuf>,

  /// Log file rotation: "daily", "hourly", "never"
  /// Default: "daily"
  pub rotation: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
      rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub discovery: DiscoveryConfig,

  #[serde(default)]
  pub refresh: RefreshConfig,

  #[serde(default)]
  pub server: ServerConfig,

  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Config {
  /// Load a config file. Unlike a missing discovery url, an unreadable or
  /// malformed file is reported rather than silently replaced by defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// The discovery url, which is the only setting without a usable default.
  pub fn discovery_url(&self) -> Result<&str, ConfigError> {
    match self.discovery.url.as_deref() {
      Some(url) if !url.trim().is_empty() => Ok(url),
      _ => Err(ConfigError::MissingDiscoveryUrl),
    }
  }

  /// Check everything the daemon needs before it starts.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.discovery_url()?;
    self.server.bind_addr()?;

    if self.refresh.interval_secs == 0 {
      return Err(ConfigError::InvalidValue {
        field: "refresh.interval_secs",
        reason: "must be at least 1",
      });
    }
    if self.refresh.max_concurrent_fetches == 0 {
      return Err(ConfigError::InvalidValue {
        field: "refresh.max_concurrent_fetches",
        reason: "must be at least 1",
      });
    }

    Ok(())
  }
}
