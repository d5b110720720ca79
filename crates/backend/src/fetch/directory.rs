use std::{
  iter::Peekable,
  str::Chars,
  sync::Arc,
  time::Duration,
};

use tracing::{debug, trace};

use super::{DirectoryFetchError, Transport, with_deadline};
use crate::domain::source::SourceRecord;

/// A discovery response that could not be read as `name,endpoint` records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record on line {line}: {kind}")]
pub struct RecordParseError {
  pub line: usize,
  pub kind: RecordParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordParseErrorKind {
  #[error("expected a name and an endpoint, found {found} field(s)")]
  MissingEndpoint { found: usize },
  #[error("expected {expected} fields like the first record, found {found}")]
  FieldCount { expected: usize, found: usize },
  #[error("quoted field is never closed")]
  UnterminatedQuote,
  #[error("unexpected '\"' in field")]
  StrayQuote,
}

/// Reads the shop directory from the discovery endpoint.
#[derive(Clone)]
pub struct DirectoryFetcher {
  transport: Arc<dyn Transport>,
  timeout: Option<Duration>,
}

impl DirectoryFetcher {
  pub fn new(transport: Arc<dyn Transport>, timeout: Option<Duration>) -> Self {
    Self { transport, timeout }
  }

  /// Fetch and parse the directory. Any failure means no records at all.
  pub async fn fetch(&self, url: &str) -> Result<Vec<SourceRecord>, DirectoryFetchError> {
    let body = match with_deadline(self.timeout, self.transport.get(url)).await {
      Some(Ok(body)) => body,
      Some(Err(source)) => {
        return Err(DirectoryFetchError::Transport {
          url: url.to_string(),
          source,
        });
      }
      None => {
        return Err(DirectoryFetchError::Timeout {
          url: url.to_string(),
          after: self.timeout.unwrap_or_default(),
        });
      }
    };

    trace!(url, bytes = body.len(), "Received shop directory");

    let records = parse_records(&body).map_err(|source| DirectoryFetchError::Parse {
      url: url.to_string(),
      source,
    })?;

    debug!(url, shops = records.len(), "Discovered shops");
    Ok(records)
  }
}

/// Parse a comma-separated directory body.
///
/// Blank lines are skipped. Every other record must have the same number of
/// fields as the first, and at least two: the first is the shop name, the
/// second its endpoint. Fields may be double-quoted, with `""` standing for a
/// literal quote. A quoted field may span lines. Errors carry the line the
/// offending record starts on.
pub fn parse_records(body: &str) -> Result<Vec<SourceRecord>, RecordParseError> {
  let body = body.replace("\r\n", "\n");
  let mut reader = RecordReader::new(&body);
  let mut records = Vec::new();
  let mut expected_fields = None;

  while let Some((line, mut fields)) = reader.next_record()? {
    let fail = |kind| RecordParseError { line, kind };
    let found = fields.len();

    match expected_fields {
      None => expected_fields = Some(found),
      Some(expected) if expected != found => {
        return Err(fail(RecordParseErrorKind::FieldCount { expected, found }));
      }
      Some(_) => {}
    }

    if found < 2 {
      return Err(fail(RecordParseErrorKind::MissingEndpoint { found }));
    }

    fields.truncate(2);
    let endpoint = fields.pop().unwrap_or_default();
    let name = fields.pop().unwrap_or_default();
    records.push(SourceRecord { name, endpoint });
  }

  Ok(records)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldState {
  Start,
  Bare,
  Quoted,
  QuoteClosed,
}

/// Walks a `\n`-terminated body one record at a time, tracking physical lines.
struct RecordReader<'a> {
  chars: Peekable<Chars<'a>>,
  line: usize,
}

impl<'a> RecordReader<'a> {
  fn new(body: &'a str) -> Self {
    Self {
      chars: body.chars().peekable(),
      line: 1,
    }
  }

  /// The next record and the line it starts on, or `None` at end of input.
  fn next_record(&mut self) -> Result<Option<(usize, Vec<String>)>, RecordParseError> {
    while self.chars.next_if_eq(&'\n').is_some() {
      self.line += 1;
    }
    if self.chars.peek().is_none() {
      return Ok(None);
    }

    let start = self.line;
    let fail = |kind| RecordParseError { line: start, kind };
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut state = FieldState::Start;

    while let Some(c) = self.chars.next() {
      state = match (state, c) {
        (FieldState::Quoted, '"') if self.chars.next_if_eq(&'"').is_some() => {
          field.push('"');
          FieldState::Quoted
        }
        (FieldState::Quoted, '"') => FieldState::QuoteClosed,
        (FieldState::Quoted, c) => {
          if c == '\n' {
            self.line += 1;
          }
          field.push(c);
          FieldState::Quoted
        }
        (_, '\n') => {
          self.line += 1;
          fields.push(field);
          return Ok(Some((start, fields)));
        }
        (_, ',') => {
          fields.push(std::mem::take(&mut field));
          FieldState::Start
        }
        (FieldState::Start, '"') => FieldState::Quoted,
        (FieldState::QuoteClosed, _) | (FieldState::Bare, '"') => {
          return Err(fail(RecordParseErrorKind::StrayQuote));
        }
        (_, c) => {
          field.push(c);
          FieldState::Bare
        }
      };
    }

    if state == FieldState::Quoted {
      return Err(fail(RecordParseErrorKind::UnterminatedQuote));
    }

    fields.push(field);
    Ok(Some((start, fields)))
  }
}
