//! Error type for `patron-store-sqlite`.

use patron_core::store::{FailureKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Core(#[from] patron_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decimal parse error: {0}")]
  Decimal(#[from] rust_decimal::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column held a value this build does not know.
  #[error("unknown {column} value: {value:?}")]
  UnknownVariant {
    column: &'static str,
    value:  String,
  },
}

impl StoreError for Error {
  fn kind(&self) -> FailureKind {
    match self {
      Self::Core(e) => e.kind(),
      _ => FailureKind::Storage,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
