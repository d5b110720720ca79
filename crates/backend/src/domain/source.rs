use std::{collections::HashSet, fmt};

/// The published unit: every distinct flavor seen in one refresh cycle.
pub type FlavorSet = HashSet<String>;

/// One shop listed by the discovery endpoint.
///
/// Lives only for the cycle that fetched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
  pub name: String,
  pub endpoint: String,
}

impl SourceRecord {
  pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      endpoint: endpoint.into(),
    }
  }
}

/// Sequence number assigned to a refresh cycle when it starts.
///
/// Later cycles always get larger ids, which lets the snapshot store tell an
/// overtaking cycle apart from a late one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId(u64);

impl CycleId {
  pub const fn new(value: u64) -> Self {
    Self(value)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for CycleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}
