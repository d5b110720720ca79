//! One refresh cycle: discover shops, fetch every shop concurrently, union the
//! results and publish them.
//!
//! ```text
//! START → DIRECTORY_FETCHED → FANNED_OUT → COLLECTED → PUBLISHED
//!               ↓                                        ↓
//!            ABORTED                                 SUPERSEDED
//! ```
//!
//! A failed discovery call aborts the cycle and leaves the store untouched.
//! A failed shop only empties its own contribution. Nothing is written until
//! every shop in the cycle has answered or hit its deadline.

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Instant,
};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
  domain::{
    config::RefreshConfig,
    source::{CycleId, FlavorSet},
  },
  fetch::{DirectoryFetchError, DirectoryFetcher, ItemFetcher, Transport},
  snapshot::{PublishOutcome, SnapshotStore},
};

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
  /// The cycle's union is now being served
  Published {
    cycle: CycleId,
    sources: usize,
    failed_sources: usize,
    flavors: usize,
  },
  /// A newer cycle had already published, so this result was dropped
  Superseded { cycle: CycleId, current: CycleId },
  /// Discovery failed; the previous snapshot keeps serving
  Aborted { cycle: CycleId, error: DirectoryFetchError },
}

impl CycleOutcome {
  pub fn cycle(&self) -> CycleId {
    match self {
      Self::Published { cycle, .. } | Self::Superseded { cycle, .. } | Self::Aborted { cycle, .. } => *cycle,
    }
  }

  pub fn is_published(&self) -> bool {
    matches!(self, Self::Published { .. })
  }
}

pub struct Refresher {
  discovery_url: String,
  directory: DirectoryFetcher,
  items: ItemFetcher,
  store: Arc<SnapshotStore>,
  max_concurrent: usize,
  next_cycle: AtomicU64,
}

impl Refresher {
  pub fn new(
    discovery_url: impl Into<String>,
    transport: Arc<dyn Transport>,
    store: Arc<SnapshotStore>,
    config: &RefreshConfig,
  ) -> Self {
    let timeout = config.fetch_timeout();
    Self {
      discovery_url: discovery_url.into(),
      directory: DirectoryFetcher::new(Arc::clone(&transport), timeout),
      items: ItemFetcher::new(transport, timeout),
      store,
      max_concurrent: config.max_concurrent_fetches.max(1),
      next_cycle: AtomicU64::new(1),
    }
  }

  pub fn store(&self) -> &Arc<SnapshotStore> {
    &self.store
  }

  /// Run one full cycle. Never fails: every problem is logged and reported in
  /// the returned outcome.
  #[tracing::instrument(level = "debug", skip(self), fields(cycle = tracing::field::Empty))]
  pub async fn run_cycle(&self) -> CycleOutcome {
    let cycle = CycleId::new(self.next_cycle.fetch_add(1, Ordering::Relaxed));
    tracing::Span::current().record("cycle", tracing::field::display(cycle));
    let start = Instant::now();

    let shops = match self.directory.fetch(&self.discovery_url).await {
      Ok(shops) => shops,
      Err(error) => {
        warn!(%cycle, error = %error, "Failed to discover shops, keeping previous flavors");
        return CycleOutcome::Aborted { cycle, error };
      }
    };

    for shop in &shops {
      info!(%cycle, shop = %shop.name, url = %shop.endpoint, "Processing shop");
    }

    let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
    let fetches: Vec<_> = shops
      .iter()
      .map(|shop| {
        let permit = Arc::clone(&semaphore);
        let items = &self.items;
        let endpoint = shop.endpoint.as_str();
        async move {
          let Ok(_permit) = permit.acquire().await else {
            return None;
          };
          match items.try_fetch(endpoint).await {
            Ok(flavors) => Some(flavors),
            Err(e) => {
              warn!(%cycle, error = %e, "Failed to get flavors");
              None
            }
          }
        }
      })
      .collect();

    // Fan-in: wait for every shop before touching the store
    let results = futures::future::join_all(fetches).await;

    let failed_sources = results.iter().filter(|r| r.is_none()).count();
    let flavors: FlavorSet = results.into_iter().flatten().flatten().collect();
    let count = flavors.len();

    debug!(
      %cycle,
      shops = shops.len(),
      failed_sources,
      flavors = count,
      elapsed_ms = start.elapsed().as_millis(),
      "Collected flavors"
    );

    match self.store.publish(cycle, flavors) {
      PublishOutcome::Published => CycleOutcome::Published {
        cycle,
        sources: shops.len(),
        failed_sources,
        flavors: count,
      },
      PublishOutcome::Rejected { current } => {
        info!(%cycle, %current, "Cycle finished after a newer one, result discarded");
        CycleOutcome::Superseded { cycle, current }
      }
    }
  }
}
