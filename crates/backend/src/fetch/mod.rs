mod directory;
mod http;
mod items;

use std::time::Duration;

use async_trait::async_trait;

pub use directory::{DirectoryFetcher, RecordParseError, RecordParseErrorKind, parse_records};
pub use http::HttpTransport;
pub use items::{ItemFetcher, split_items};

/// A read-only request against a URL that yields the response body as text.
///
/// Implementations must be safe to call from any number of tasks at once.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, url: &str) -> Result<String, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("Server returned status {status}")]
  Status { status: u16 },
}

/// The discovery call failed; the cycle is aborted and the previous snapshot stays.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryFetchError {
  #[error("Failed to discover shops from {url}: {source}")]
  Transport {
    url: String,
    #[source]
    source: TransportError,
  },
  #[error("Discovery request to {url} timed out after {after:?}")]
  Timeout { url: String, after: Duration },
  #[error("Failed to parse shop list from {url}: {source}")]
  Parse {
    url: String,
    #[source]
    source: RecordParseError,
  },
}

/// One shop could not be read; it contributes nothing to the cycle.
#[derive(Debug, thiserror::Error)]
pub enum SourceFetchError {
  #[error("Failed to get flavors from {url}: {source}")]
  Transport {
    url: String,
    #[source]
    source: TransportError,
  },
  #[error("Flavor request to {url} timed out after {after:?}")]
  Timeout { url: String, after: Duration },
}

/// Run `fut` under an optional deadline, returning `None` if it elapsed.
pub(crate) async fn with_deadline<F: std::future::Future>(deadline: Option<Duration>, fut: F) -> Option<F::Output> {
  match deadline {
    Some(after) => tokio::time::timeout(after, fut).await.ok(),
    None => Some(fut.await),
  }
}
