//! The published flavor set.
//!
//! The store owns exactly one `Arc<FlavorSet>`. Writers swap the whole `Arc`
//! and readers clone it, so the lock is only held for a pointer copy and a
//! reader can never see a set that is still being built.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::domain::{
  config::PublishPolicy,
  source::{CycleId, FlavorSet},
};

/// Result of offering a cycle's set to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
  /// The set is now being served
  Published,
  /// A newer cycle had already published; the offered set was dropped
  Rejected { current: CycleId },
}

struct Published {
  cycle: Option<CycleId>,
  flavors: Arc<FlavorSet>,
}

pub struct SnapshotStore {
  policy: PublishPolicy,
  current: Mutex<Published>,
}

impl SnapshotStore {
  pub fn new(policy: PublishPolicy) -> Self {
    Self::with_initial(policy, FlavorSet::new())
  }

  /// Start from a configured default instead of the empty set.
  pub fn with_initial(policy: PublishPolicy, initial: FlavorSet) -> Self {
    Self {
      policy,
      current: Mutex::new(Published {
        cycle: None,
        flavors: Arc::new(initial),
      }),
    }
  }

  pub fn policy(&self) -> PublishPolicy {
    self.policy
  }

  // Nothing inside the critical sections can panic halfway through a swap,
  // so a poisoned lock still guards a complete value.
  fn lock(&self) -> MutexGuard<'_, Published> {
    self.current.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The set as of the last completed write.
  pub fn read(&self) -> Arc<FlavorSet> {
    Arc::clone(&self.lock().flavors)
  }

  /// Members of the current set, sorted so repeated reads serialize identically.
  pub fn flavors(&self) -> Vec<String> {
    let snapshot = self.read();
    let mut flavors: Vec<String> = snapshot.iter().cloned().collect();
    flavors.sort_unstable();
    flavors
  }

  /// The cycle that produced the current set, `None` while serving the initial value.
  pub fn cycle(&self) -> Option<CycleId> {
    self.lock().cycle
  }

  /// Swap in a new set unconditionally. The previous set is dropped once the
  /// last reader holding it lets go.
  pub fn replace(&self, flavors: FlavorSet) {
    let flavors = Arc::new(flavors);
    let mut current = self.lock();
    current.flavors = flavors;
    current.cycle = None;
  }

  /// Offer the result of `cycle`. Under [`PublishPolicy::Monotonic`] a cycle
  /// older than the one currently served is turned away.
  pub fn publish(&self, cycle: CycleId, flavors: FlavorSet) -> PublishOutcome {
    let count = flavors.len();
    let flavors = Arc::new(flavors);

    let mut current = self.lock();
    if self.policy == PublishPolicy::Monotonic
      && let Some(stored) = current.cycle
      && stored > cycle
    {
      debug!(%cycle, current = %stored, "Dropping result from an older cycle");
      return PublishOutcome::Rejected { current: stored };
    }

    current.cycle = Some(cycle);
    current.flavors = flavors;
    drop(current);

    info!(%cycle, flavors = count, "Published flavors");
    PublishOutcome::Published
  }
}

impl Default for SnapshotStore {
  fn default() -> Self {
    Self::new(PublishPolicy::default())
  }
}
