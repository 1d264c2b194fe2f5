//! Error types for `patron-core`.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// The donor does not exist, or belongs to another organization.
  #[error("donor not found: {0}")]
  DonorNotFound(Uuid),

  #[error("donation amount must be positive, got {0}")]
  InvalidAmount(Decimal),

  /// The donor's gift total would no longer fit in a `Decimal`.
  #[error("donation total for donor {0} is out of range")]
  TotalOverflow(Uuid),

  #[error("invalid {field}: {reason}")]
  Validation {
    field:  &'static str,
    reason: String,
  },
}

impl Error {
  pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Validation { field, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
