//! Scheduler tests: startup cycle, periodic ticks, overlap and shutdown.

#[cfg(test)]
mod tests {
  use std::{sync::Arc, time::Duration};

  use tokio_util::sync::CancellationToken;

  use crate::{
    __tests__::helpers::{DISCOVERY_URL, MockTransport, Reply, refresher, refresher_with, set, two_shops, wait_for},
    domain::config::{PublishPolicy, RefreshConfig},
    scheduler::Scheduler,
  };

  #[tokio::test]
  async fn test_first_cycle_runs_immediately() {
    let transport = MockTransport::new();
    two_shops(&transport);
    let refresher = refresher(transport);
    let store = Arc::clone(refresher.store());

    let cancel = CancellationToken::new();
    // An interval far longer than the test: only the startup cycle can publish
    let handle = Scheduler::new(refresher, Duration::from_secs(3600)).spawn(cancel.clone());

    assert!(
      wait_for(Duration::from_secs(2), || store.cycle().is_some()).await,
      "startup cycle should publish without waiting for a tick"
    );
    assert_eq!(*store.read(), set(&["rum raisin", "cherry garcia", "chunky monkey"]));

    cancel.cancel();
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn test_cycles_repeat_every_interval() {
    let transport = MockTransport::new();
    two_shops(&transport);
    let refresher = refresher(Arc::clone(&transport));

    let cancel = CancellationToken::new();
    let handle = Scheduler::new(refresher, Duration::from_millis(50)).spawn(cancel.clone());

    assert!(
      wait_for(Duration::from_secs(2), || transport.calls(DISCOVERY_URL) >= 3).await,
      "expected several discovery calls, saw {}",
      transport.calls(DISCOVERY_URL)
    );

    cancel.cancel();
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn test_stalled_cycle_does_not_block_next_launch() {
    let transport = MockTransport::new();
    // Discovery never answers and there is no deadline on it here
    transport.route(DISCOVERY_URL, Reply::Hang);
    let config = RefreshConfig {
      fetch_timeout_secs: 0,
      ..Default::default()
    };
    let refresher = refresher_with(Arc::clone(&transport), PublishPolicy::Monotonic, &config);

    let cancel = CancellationToken::new();
    let handle = Scheduler::new(refresher, Duration::from_millis(30)).spawn(cancel.clone());

    assert!(
      wait_for(Duration::from_secs(2), || transport.calls(DISCOVERY_URL) >= 3).await,
      "new cycles should launch while earlier ones are still stuck"
    );

    // Shutdown aborts the stuck cycles instead of waiting on them
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
      .await
      .expect("scheduler should stop promptly")
      .unwrap();
  }

  #[tokio::test]
  async fn test_no_cycles_after_cancel() {
    let transport = MockTransport::new();
    two_shops(&transport);
    let refresher = refresher(Arc::clone(&transport));

    let cancel = CancellationToken::new();
    let handle = Scheduler::new(refresher, Duration::from_millis(20)).spawn(cancel.clone());
    wait_for(Duration::from_secs(2), || transport.calls(DISCOVERY_URL) >= 1).await;

    cancel.cancel();
    handle.await.unwrap();
    let calls = transport.calls(DISCOVERY_URL);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.calls(DISCOVERY_URL), calls);
  }
}
