mod daemon;
mod domain;
mod fetch;
mod refresh;
mod scheduler;
mod server;
mod snapshot;

#[cfg(test)]
mod __tests__;

pub use daemon::{Daemon, DaemonError};
pub use domain::{
  config,
  source::{CycleId, FlavorSet, SourceRecord},
};
pub use fetch::{
  DirectoryFetchError, DirectoryFetcher, HttpTransport, ItemFetcher, RecordParseError, RecordParseErrorKind,
  SourceFetchError, Transport, TransportError, parse_records, split_items,
};
pub use refresh::{CycleOutcome, Refresher};
pub use scheduler::Scheduler;
pub use server::{encode_records, router};
pub use snapshot::{PublishOutcome, SnapshotStore};
