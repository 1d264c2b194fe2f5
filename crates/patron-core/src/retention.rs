//! Retention classifier. Derives a donor's aggregate fields and risk tier
//! from their full donation history.
//!
//! Pure and infallible: every input, including an empty history, produces a
//! value. The caller picks `as_of` so results are reproducible.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{donation::Donation, donor::RetentionRisk};

/// A single-gift donor is at high risk after this many days without giving.
pub const FIRST_GIFT_HIGH_AFTER_DAYS: i64 = 60;
/// A repeat donor is at high risk after this many days without giving.
pub const REPEAT_GIFT_HIGH_AFTER_DAYS: i64 = 180;
/// Any donor is critical after this many days without giving.
pub const CRITICAL_AFTER_DAYS: i64 = 365;

/// The derived, donor-level summary of a giving history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorAggregate {
  pub total_gifts:     u32,
  pub total_amount:    Decimal,
  pub first_gift_date: Option<DateTime<Utc>>,
  pub last_gift_date:  Option<DateTime<Utc>>,
  pub retention_risk:  RetentionRisk,
}

impl Default for DonorAggregate {
  fn default() -> Self {
    Self {
      total_gifts:     0,
      total_amount:    Decimal::ZERO,
      first_gift_date: None,
      last_gift_date:  None,
      retention_risk:  RetentionRisk::Unknown,
    }
  }
}

/// Compute the aggregate for `donations` as seen at `as_of`.
///
/// Donations are ordered by `date` with a stable sort, so gifts sharing a
/// date keep the order they were supplied in.
pub fn compute(donations: &[Donation], as_of: DateTime<Utc>) -> DonorAggregate {
  if donations.is_empty() {
    return DonorAggregate::default();
  }

  let mut ordered: Vec<&Donation> = donations.iter().collect();
  ordered.sort_by_key(|d| d.date);

  let total_gifts = u32::try_from(ordered.len()).unwrap_or(u32::MAX);
  let total_amount = ordered
    .iter()
    .fold(Decimal::ZERO, |acc, d| acc.saturating_add(d.amount));
  let first_gift_date = ordered.first().map(|d| d.date);
  let last_gift_date = ordered.last().map(|d| d.date);

  let retention_risk = match last_gift_date {
    Some(last) => classify(total_gifts, days_since(last, as_of)),
    None => RetentionRisk::Unknown,
  };

  DonorAggregate {
    total_gifts,
    total_amount,
    first_gift_date,
    last_gift_date,
    retention_risk,
  }
}

/// Exact sum of `donations`' amounts, or `None` if it does not fit in a
/// [`Decimal`]. [`compute`] saturates instead; callers that persist the total
/// check here first.
pub fn checked_total(donations: &[Donation]) -> Option<Decimal> {
  donations
    .iter()
    .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(d.amount))
}

/// Whole days elapsed from `last_gift` to `as_of`. Gifts dated after `as_of`
/// count as zero days.
pub fn days_since(last_gift: DateTime<Utc>, as_of: DateTime<Utc>) -> i64 {
  (as_of - last_gift).num_days().max(0)
}

/// The risk threshold table. Thresholds are exclusive: a donor exactly at a
/// boundary stays in the lower tier.
pub fn classify(total_gifts: u32, days_since: i64) -> RetentionRisk {
  match total_gifts {
    0 => RetentionRisk::Unknown,
    _ if days_since > CRITICAL_AFTER_DAYS => RetentionRisk::Critical,
    1 if days_since > FIRST_GIFT_HIGH_AFTER_DAYS => RetentionRisk::High,
    1 => RetentionRisk::Medium,
    _ if days_since > REPEAT_GIFT_HIGH_AFTER_DAYS => RetentionRisk::High,
    _ => RetentionRisk::Low,
  }
}
