//! Refresh cycle tests: fan-out, fan-in, union and the publish rules.

#[cfg(test)]
mod tests {
  use std::{sync::Arc, time::Duration};

  use pretty_assertions::assert_eq;

  use crate::{
    __tests__::helpers::{
      DISCOVERY_URL, MockTransport, Reply, directory, refresh_config, refresher, refresher_with, set, shop_url,
      two_shops,
    },
    domain::{
      config::{PublishPolicy, RefreshConfig},
      source::CycleId,
    },
    fetch::{DirectoryFetchError, ItemFetcher, SourceFetchError, TransportError},
    refresh::CycleOutcome,
  };

  // ==========================================================================
  // Union
  // ==========================================================================

  #[tokio::test]
  async fn test_two_shops_union_collapses_duplicates() {
    let transport = MockTransport::new();
    two_shops(&transport);
    let refresher = refresher(transport);

    let outcome = refresher.run_cycle().await;

    assert!(matches!(
      outcome,
      CycleOutcome::Published {
        sources: 2,
        failed_sources: 0,
        flavors: 3,
        ..
      }
    ));
    assert_eq!(
      *refresher.store().read(),
      set(&["rum raisin", "cherry garcia", "chunky monkey"])
    );
  }

  #[tokio::test]
  async fn test_duplicates_within_one_shop_collapse() {
    let transport = MockTransport::new();
    transport
      .body(DISCOVERY_URL, &directory(&["solo"]))
      .body(&shop_url("solo"), "mint\nmint\n\nmint\n");
    let refresher = refresher(transport);

    refresher.run_cycle().await;

    // The blank middle line is an item of its own
    assert_eq!(*refresher.store().read(), set(&["mint", ""]));
  }

  #[tokio::test]
  async fn test_empty_directory_publishes_empty_set() {
    let transport = MockTransport::new();
    two_shops(&transport);
    let refresher = refresher(Arc::clone(&transport));
    refresher.run_cycle().await;
    assert_eq!(refresher.store().read().len(), 3);

    transport.body(DISCOVERY_URL, "");
    let outcome = refresher.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::Published { sources: 0, flavors: 0, .. }));
    assert!(refresher.store().read().is_empty());
  }

  // ==========================================================================
  // Directory failures abort without touching the store
  // ==========================================================================

  #[tokio::test]
  async fn test_directory_transport_error_on_first_run_leaves_empty_set() {
    let transport = MockTransport::new();
    transport.route(DISCOVERY_URL, Reply::Status(502));
    let refresher = refresher(transport);

    let outcome = refresher.run_cycle().await;

    assert!(matches!(
      outcome,
      CycleOutcome::Aborted {
        error: DirectoryFetchError::Transport {
          source: TransportError::Status { status: 502 },
          ..
        },
        ..
      }
    ));
    assert!(refresher.store().read().is_empty());
    assert_eq!(refresher.store().cycle(), None);
  }

  #[tokio::test]
  async fn test_directory_failure_keeps_previous_snapshot() {
    let transport = MockTransport::new();
    two_shops(&transport);
    let refresher = refresher(Arc::clone(&transport));
    refresher.run_cycle().await;
    let before = refresher.store().read();

    transport.route(DISCOVERY_URL, Reply::Status(503));
    let outcome = refresher.run_cycle().await;

    assert!(matches!(
      outcome,
      CycleOutcome::Aborted {
        error: DirectoryFetchError::Transport {
          source: TransportError::Status { status: 503 },
          ..
        },
        ..
      }
    ));
    assert!(Arc::ptr_eq(&before, &refresher.store().read()));
    assert_eq!(refresher.store().cycle(), Some(CycleId::new(1)));
  }

  #[tokio::test]
  async fn test_hung_directory_times_out_and_keeps_previous_snapshot() {
    let transport = MockTransport::new();
    two_shops(&transport);
    let refresher = refresher(Arc::clone(&transport));
    refresher.run_cycle().await;
    let before = refresher.store().read();

    transport.route(DISCOVERY_URL, Reply::Hang);
    let outcome = tokio::time::timeout(Duration::from_secs(5), refresher.run_cycle())
      .await
      .expect("deadline should stop a hung discovery call");

    assert!(matches!(
      outcome,
      CycleOutcome::Aborted {
        error: DirectoryFetchError::Timeout { after, .. },
        ..
      } if after == Duration::from_secs(1)
    ));
    assert!(Arc::ptr_eq(&before, &refresher.store().read()));
    assert_eq!(refresher.store().cycle(), Some(CycleId::new(1)));
  }

  #[tokio::test]
  async fn test_malformed_directory_aborts_whole_cycle() {
    let transport = MockTransport::new();
    two_shops(&transport);
    transport.body(DISCOVERY_URL, &format!("shop1,{}\nshop2\n", shop_url("shop1")));
    let refresher = refresher(Arc::clone(&transport));

    let outcome = refresher.run_cycle().await;

    assert!(matches!(
      outcome,
      CycleOutcome::Aborted {
        error: DirectoryFetchError::Parse { .. },
        ..
      }
    ));
    // No shop was contacted for a directory that failed to parse
    assert_eq!(transport.calls(&shop_url("shop1")), 0);
    assert!(refresher.store().read().is_empty());
  }

  // ==========================================================================
  // Shop failures degrade to an empty contribution
  // ==========================================================================

  #[tokio::test]
  async fn test_failed_shop_contributes_nothing() {
    let transport = MockTransport::new();
    two_shops(&transport);
    transport.route(&shop_url("shop2"), Reply::Status(502));
    let refresher = refresher(transport);

    let outcome = refresher.run_cycle().await;

    assert!(matches!(
      outcome,
      CycleOutcome::Published {
        sources: 2,
        failed_sources: 1,
        ..
      }
    ));
    assert_eq!(*refresher.store().read(), set(&["rum raisin", "cherry garcia"]));
  }

  #[tokio::test]
  async fn test_non_success_shop_contributes_nothing() {
    let transport = MockTransport::new();
    two_shops(&transport);
    transport.route(&shop_url("shop1"), Reply::Status(500));
    let refresher = refresher(transport);

    refresher.run_cycle().await;

    assert_eq!(*refresher.store().read(), set(&["rum raisin", "chunky monkey"]));
  }

  #[tokio::test]
  async fn test_hung_shop_is_cut_off_by_deadline() {
    let transport = MockTransport::new();
    two_shops(&transport);
    transport.route(&shop_url("shop1"), Reply::Hang);
    let refresher = refresher(transport);

    let outcome = tokio::time::timeout(Duration::from_secs(5), refresher.run_cycle())
      .await
      .expect("deadline should stop the hung shop from stalling the cycle");

    assert!(matches!(outcome, CycleOutcome::Published { failed_sources: 1, .. }));
    assert_eq!(*refresher.store().read(), set(&["rum raisin", "chunky monkey"]));
  }

  #[tokio::test]
  async fn test_item_fetcher_degrades_to_empty() {
    let transport = MockTransport::new();
    transport.route(&shop_url("slow"), Reply::Hang);
    transport.route(&shop_url("gone"), Reply::Status(404));
    let fetcher = ItemFetcher::new(transport, Some(Duration::from_millis(50)));

    assert!(fetcher.fetch(&shop_url("slow")).await.is_empty());
    assert!(fetcher.fetch(&shop_url("gone")).await.is_empty());
    assert!(matches!(
      fetcher.try_fetch(&shop_url("slow")).await,
      Err(SourceFetchError::Timeout { .. })
    ));
    assert!(matches!(
      fetcher.try_fetch(&shop_url("gone")).await,
      Err(SourceFetchError::Transport {
        source: TransportError::Status { status: 404 },
        ..
      })
    ));
  }

  // ==========================================================================
  // Fan-out
  // ==========================================================================

  #[tokio::test]
  async fn test_fan_out_is_bounded() {
    let transport = MockTransport::new();
    let names: Vec<String> = (0..10).map(|i| format!("shop{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    transport.body(DISCOVERY_URL, &directory(&name_refs));
    for name in &names {
      transport.route(
        &shop_url(name),
        Reply::Delayed(Duration::from_millis(30), format!("{name}-special\n")),
      );
    }

    let config = RefreshConfig {
      max_concurrent_fetches: 3,
      ..refresh_config()
    };
    let refresher = refresher_with(Arc::clone(&transport), PublishPolicy::Monotonic, &config);

    let outcome = refresher.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::Published { flavors: 10, .. }));
    assert!(transport.max_in_flight() <= 3, "saw {} requests at once", transport.max_in_flight());
    assert!(transport.max_in_flight() > 1, "shops should be fetched concurrently");
  }

  // ==========================================================================
  // Overlapping cycles
  // ==========================================================================

  /// Cycle 1 stalls on discovery while cycle 2 runs to completion. Returns
  /// the outcome of cycle 1 once it finally lands.
  async fn race_old_cycle_against_new(policy: PublishPolicy) -> (CycleOutcome, Arc<crate::refresh::Refresher>) {
    let transport = MockTransport::new();
    transport
      .route(
        DISCOVERY_URL,
        Reply::Delayed(Duration::from_millis(200), directory(&["old"])),
      )
      .body(&shop_url("old"), "old flavor\n")
      .body(&shop_url("new"), "new flavor\n");
    let refresher = refresher_with(Arc::clone(&transport), policy, &refresh_config());

    let slow = {
      let refresher = Arc::clone(&refresher);
      tokio::spawn(async move { refresher.run_cycle().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The old cycle already captured its reply; this only affects cycle 2
    transport.body(DISCOVERY_URL, &directory(&["new"]));
    let fast = refresher.run_cycle().await;
    assert!(matches!(fast, CycleOutcome::Published { .. }));
    assert_eq!(fast.cycle(), CycleId::new(2));

    (slow.await.unwrap(), refresher)
  }

  #[tokio::test]
  async fn test_monotonic_store_rejects_late_older_cycle() {
    let (outcome, refresher) = race_old_cycle_against_new(PublishPolicy::Monotonic).await;

    assert!(matches!(
      outcome,
      CycleOutcome::Superseded { cycle, current } if cycle == CycleId::new(1) && current == CycleId::new(2)
    ));
    assert_eq!(*refresher.store().read(), set(&["new flavor"]));
  }

  #[tokio::test]
  async fn test_last_writer_wins_lets_older_cycle_overwrite() {
    let (outcome, refresher) = race_old_cycle_against_new(PublishPolicy::LastWriterWins).await;

    assert!(outcome.is_published());
    assert_eq!(*refresher.store().read(), set(&["old flavor"]));
  }
}
