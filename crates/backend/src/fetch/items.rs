use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};

use super::{SourceFetchError, Transport, with_deadline};

/// Reads one shop's flavor list.
///
/// Holds no per-call state, so a single fetcher is shared by every concurrent
/// request in a cycle.
#[derive(Clone)]
pub struct ItemFetcher {
  transport: Arc<dyn Transport>,
  timeout: Option<Duration>,
}

impl ItemFetcher {
  pub fn new(transport: Arc<dyn Transport>, timeout: Option<Duration>) -> Self {
    Self { transport, timeout }
  }

  /// Fetch a shop's flavors, degrading any failure to an empty list.
  pub async fn fetch(&self, endpoint: &str) -> Vec<String> {
    match self.try_fetch(endpoint).await {
      Ok(items) => items,
      Err(e) => {
        warn!(error = %e, "Failed to get flavors");
        Vec::new()
      }
    }
  }

  pub async fn try_fetch(&self, endpoint: &str) -> Result<Vec<String>, SourceFetchError> {
    let body = match with_deadline(self.timeout, self.transport.get(endpoint)).await {
      Some(Ok(body)) => body,
      Some(Err(source)) => {
        return Err(SourceFetchError::Transport {
          url: endpoint.to_string(),
          source,
        });
      }
      None => {
        return Err(SourceFetchError::Timeout {
          url: endpoint.to_string(),
          after: self.timeout.unwrap_or_default(),
        });
      }
    };

    let items = split_items(&body);
    debug!(endpoint, items = items.len(), "Fetched flavors");
    Ok(items)
  }
}

/// One item per line. `\r\n` is accepted, a final terminator does not add an
/// empty item, and blank lines in the middle are kept as empty items.
pub fn split_items(body: &str) -> Vec<String> {
  body.lines().map(str::to_string).collect()
}
