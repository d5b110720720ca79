//! HTTP publication endpoint.
//!
//! Serves the snapshot store's current set at `GET /flavors`, one record per
//! line. Handlers only ever read the store, never wait on a refresh cycle.

use std::sync::Arc;

use axum::{
  Router,
  extract::State,
  http::header,
  response::IntoResponse,
  routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::trace;

use crate::snapshot::SnapshotStore;

pub fn router(store: Arc<SnapshotStore>) -> Router {
  Router::new()
    .route("/flavors", get(list_flavors))
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}

async fn list_flavors(State(store): State<Arc<SnapshotStore>>) -> impl IntoResponse {
  let flavors = store.flavors();
  trace!(flavors = flavors.len(), "Serving flavors");
  ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], encode_records(&flavors))
}

/// Write each value as a single-field CSV record terminated by `\n`.
pub fn encode_records<S: AsRef<str>>(values: &[S]) -> String {
  let mut out = String::new();
  for value in values {
    let value = value.as_ref();
    if needs_quotes(value) {
      out.push('"');
      out.push_str(&value.replace('"', "\"\""));
      out.push('"');
    } else {
      out.push_str(value);
    }
    out.push('\n');
  }
  out
}

fn needs_quotes(value: &str) -> bool {
  value == r"\." || value.starts_with(char::is_whitespace) || value.contains([',', '"', '\r', '\n'])
}
