use std::{sync::Arc, time::Duration};

use tokio::{
  task::{JoinHandle, JoinSet},
  time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::refresh::{CycleOutcome, Refresher};

/// Background task that launches refresh cycles.
///
/// Fires one cycle immediately and then one per interval tick. Cycles are
/// spawned rather than awaited, so a slow cycle never delays the next launch
/// and several cycles may be in flight at once. The snapshot store decides
/// which result ends up served.
pub struct Scheduler {
  refresher: Arc<Refresher>,
  interval: Duration,
}

impl Scheduler {
  /// Create a new scheduler.
  pub fn new(refresher: Arc<Refresher>, interval: Duration) -> Self {
    Self { refresher, interval }
  }

  /// Run on a new task until `cancel` fires.
  pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(self.run(cancel))
  }

  /// Run the scheduler until cancelled. Cycles still in flight at that point
  /// are aborted.
  pub async fn run(self, cancel: CancellationToken) {
    let mut timer = interval(self.interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycles: JoinSet<CycleOutcome> = JoinSet::new();

    info!(interval_secs = self.interval.as_secs_f64(), "Scheduler started");

    loop {
      tokio::select! {
          biased;

          _ = cancel.cancelled() => {
              info!("Scheduler shutting down (cancelled)");
              break;
          }

          // The first tick completes immediately, which gives the startup cycle
          _ = timer.tick() => {
              let refresher = Arc::clone(&self.refresher);
              cycles.spawn(async move { refresher.run_cycle().await });
              trace!(in_flight = cycles.len(), "Launched refresh cycle");
          }

          Some(finished) = cycles.join_next(), if !cycles.is_empty() => {
              match finished {
                  Ok(outcome) => debug!(cycle = %outcome.cycle(), published = outcome.is_published(), "Refresh cycle finished"),
                  Err(e) if e.is_panic() => error!(error = %e, "Refresh cycle panicked"),
                  Err(_) => {}
              }
          }
      }
    }

    if !cycles.is_empty() {
      debug!(in_flight = cycles.len(), "Aborting in-flight refresh cycles");
    }
    cycles.shutdown().await;

    info!("Scheduler stopped");
  }
}
