//! Daemon lifecycle management.
//!
//! # Architecture
//!
//! ```text
//! Daemon (Supervisor)
//!   ├── Server (axum listener, GET /flavors)
//!   ├── Scheduler (launches refresh cycles every interval)
//!   │     └── Refresher (per cycle: discovery → shops × N → union)
//!   └── SnapshotStore (shared by the server and the refresher)
//! ```
//!
//! # Lifecycle
//!
//! 1. Create master `CancellationToken`
//! 2. Build the HTTP transport, snapshot store and refresher
//! 3. Bind the listener (a bind failure stops startup before any cycle runs)
//! 4. Spawn the `Scheduler` with a child token
//! 5. Serve until ctrl-c or cancellation
//! 6. Graceful shutdown: cancel children, wait for the scheduler

use std::{net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, signal, task::JoinError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
  domain::config::{Config, ConfigError},
  fetch::{HttpTransport, Transport},
  refresh::Refresher,
  scheduler::Scheduler,
  server,
  snapshot::SnapshotStore,
};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error("Failed to bind {addr}: {source}")]
  Bind {
    addr: SocketAddr,
    #[source]
    source: std::io::Error,
  },
  #[error("HTTP server error: {0}")]
  Serve(#[source] std::io::Error),
}

/// The aggregation daemon - owns the snapshot store and everything that
/// reads or writes it.
///
/// # Usage
///
/// ```ignore
/// let daemon = Daemon::new(config)?;
/// daemon.run().await?;
/// ```
pub struct Daemon {
  config: Config,
  store: Arc<SnapshotStore>,
  transport: Arc<dyn Transport>,
  cancel: CancellationToken,
}

impl Daemon {
  /// Validate `config` and build a daemon that talks HTTP to the shops.
  pub fn new(config: Config) -> Result<Self, DaemonError> {
    Self::with_transport(config, Arc::new(HttpTransport::new()))
  }

  pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self, DaemonError> {
    config.validate()?;

    let initial = config.refresh.initial_flavors.iter().cloned().collect();
    let store = Arc::new(SnapshotStore::with_initial(config.refresh.policy, initial));

    Ok(Self {
      config,
      store,
      transport,
      cancel: CancellationToken::new(),
    })
  }

  pub fn store(&self) -> Arc<SnapshotStore> {
    Arc::clone(&self.store)
  }

  /// Token that stops the daemon when cancelled.
  pub fn shutdown_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Bind the configured address and run until shutdown.
  pub async fn run(self) -> Result<(), DaemonError> {
    let addr = self.config.server.bind_addr()?;
    let listener = TcpListener::bind(addr)
      .await
      .map_err(|source| DaemonError::Bind { addr, source })?;
    self.serve(listener).await
  }

  /// Run on an already bound listener until shutdown.
  pub async fn serve(self, listener: TcpListener) -> Result<(), DaemonError> {
    let discovery_url = self.config.discovery_url()?.to_string();

    info!("Starting flavor aggregator");
    info!(discovery_url = %discovery_url, "Discovery endpoint");
    if let Ok(addr) = listener.local_addr() {
      info!(%addr, "Listening");
    }

    let cancel = self.cancel;

    let refresher = Arc::new(Refresher::new(
      discovery_url,
      Arc::clone(&self.transport),
      Arc::clone(&self.store),
      &self.config.refresh,
    ));

    let scheduler_handle = Scheduler::new(refresher, self.config.refresh.interval()).spawn(cancel.child_token());

    // Handle ctrl-c gracefully
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        return;
      }
      info!("Received ctrl-c, shutting down...");
      cancel_for_signal.cancel();
    });

    let app = server::router(Arc::clone(&self.store));
    let server_cancel = cancel.child_token();
    let served = axum::serve(listener, app)
      .with_graceful_shutdown(async move { server_cancel.cancelled().await })
      .await;

    info!("Shutting down...");
    cancel.cancel();

    report_scheduler_exit(scheduler_handle.await);

    info!("Daemon shutdown complete");
    served.map_err(DaemonError::Serve)
  }
}

/// Log a scheduler task that died by panicking. Returns whether it did.
fn report_scheduler_exit(result: Result<(), JoinError>) -> bool {
  match result {
    Err(e) if e.is_panic() => {
      error!(error = %e, "Scheduler panicked");
      true
    }
    _ => false,
  }
}
