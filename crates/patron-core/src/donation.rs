//! Donation: a single gift event. Immutable once recorded.

use chrono::{DateTime, Datelike as _, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  donor::{check_len, check_opt_len},
};

/// Largest single gift accepted. Together with [`MAX_AMOUNT_SCALE`] this
/// keeps any donor's running total exactly representable.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);
/// Most decimal places an amount may carry.
pub const MAX_AMOUNT_SCALE: u32 = 4;
/// Gift dates must fall within these years so they round-trip as RFC 3339.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// The kind of gift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationType {
  #[default]
  OneTime,
  Recurring,
  Pledge,
  InKind,
}

/// A recorded gift. No field changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
  pub donation_id:     Uuid,
  pub donor_id:        Uuid,
  /// Campaign this gift is attributed to; grouping only.
  pub campaign_id:     Option<Uuid>,
  pub amount:          Decimal,
  /// When the gift was made. May be backdated; not necessarily `created_at`.
  pub date:            DateTime<Utc>,
  #[serde(rename = "type")]
  pub donation_type:   DonationType,
  pub method:          Option<String>,
  pub notes:           Option<String>,
  pub idempotency_key: Option<String>,
  /// Server-assigned timestamp.
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::DonorStore::record_donation`].
/// `donation_id` and `created_at` are always assigned by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonation {
  pub donor_id:        Uuid,
  pub amount:          Decimal,
  pub date:            DateTime<Utc>,
  #[serde(default, rename = "type")]
  pub donation_type:   DonationType,
  #[serde(default)]
  pub campaign_id:     Option<Uuid>,
  #[serde(default)]
  pub method:          Option<String>,
  #[serde(default)]
  pub notes:           Option<String>,
  /// Client-supplied key; replaying a request with the same key for the same
  /// donor returns the original donation instead of recording a second one.
  #[serde(default)]
  pub idempotency_key: Option<String>,
}

impl NewDonation {
  /// Convenience constructor with all optional fields set to their defaults.
  pub fn new(donor_id: Uuid, amount: Decimal, date: DateTime<Utc>) -> Self {
    Self {
      donor_id,
      amount,
      date,
      donation_type: DonationType::default(),
      campaign_id: None,
      method: None,
      notes: None,
      idempotency_key: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.amount <= Decimal::ZERO {
      return Err(Error::InvalidAmount(self.amount));
    }
    if self.amount > MAX_AMOUNT {
      return Err(Error::validation("amount", format!("exceeds {MAX_AMOUNT}")));
    }
    if self.amount.normalize().scale() > MAX_AMOUNT_SCALE {
      return Err(Error::validation(
        "amount",
        format!("more than {MAX_AMOUNT_SCALE} decimal places"),
      ));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&self.date.year()) {
      return Err(Error::validation(
        "date",
        format!("year must be between {MIN_YEAR} and {MAX_YEAR}"),
      ));
    }
    check_opt_len("method", self.method.as_deref(), 50)?;
    check_opt_len("notes", self.notes.as_deref(), 1000)?;
    if let Some(key) = &self.idempotency_key {
      check_len("idempotency_key", key, 1, 128)?;
    }
    Ok(())
  }
}
