use std::time::Instant;

use async_trait::async_trait;
use tracing::trace;

use super::{Transport, TransportError};

/// [`Transport`] backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Transport for HttpTransport {
  #[tracing::instrument(level = "trace", skip(self))]
  async fn get(&self, url: &str) -> Result<String, TransportError> {
    let start = Instant::now();
    let response = self.client.get(url).send().await?;

    trace!(
      status = %response.status(),
      elapsed_ms = start.elapsed().as_millis(),
      "Received response"
    );

    let status = response.status();
    if !status.is_success() {
      trace!(url, status = %status, "Request returned non-success status");
      return Err(TransportError::Status {
        status: status.as_u16(),
      });
    }

    Ok(response.text().await?)
  }
}
