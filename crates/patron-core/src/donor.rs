//! Donor: the person or entity whose giving history is tracked.
//!
//! Contact fields are free-form and owned by the caller. The aggregate fields
//! (`total_gifts` through `retention_risk`) are written only from the output
//! of [`crate::retention::compute`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Relationship status of a donor. Never changed by donation recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonorStatus {
  #[default]
  Active,
  Lapsed,
  Inactive,
  DoNotContact,
}

/// Coarse likelihood that a donor will lapse, derived from gift count and
/// recency.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionRisk {
  #[default]
  Unknown,
  Low,
  Medium,
  High,
  Critical,
}

// ─── Donor ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donor {
  pub donor_id:        Uuid,
  pub organization_id: Uuid,
  pub first_name:      String,
  pub last_name:       String,
  pub email:           Option<String>,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub city:            Option<String>,
  pub state:           Option<String>,
  pub zip_code:        Option<String>,
  pub status:          DonorStatus,
  pub total_gifts:     u32,
  pub total_amount:    Decimal,
  pub first_gift_date: Option<DateTime<Utc>>,
  pub last_gift_date:  Option<DateTime<Utc>>,
  pub retention_risk:  RetentionRisk,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

// ─── NewDonor ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::DonorStore::add_donor`]. A new donor always starts
/// with an empty aggregate and `Unknown` risk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDonor {
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub address:    Option<String>,
  pub city:       Option<String>,
  pub state:      Option<String>,
  pub zip_code:   Option<String>,
  #[serde(default)]
  pub status:     DonorStatus,
}

impl NewDonor {
  pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
    Self {
      first_name: first_name.into(),
      last_name: last_name.into(),
      ..Self::default()
    }
  }

  pub fn validate(&self) -> Result<()> {
    check_len("first_name", &self.first_name, 1, 50)?;
    check_len("last_name", &self.last_name, 1, 50)?;
    if let Some(email) = &self.email
      && !email.contains('@')
    {
      return Err(Error::validation("email", "must contain '@'"));
    }
    check_opt_len("phone", self.phone.as_deref(), 20)?;
    check_opt_len("city", self.city.as_deref(), 50)?;
    check_opt_len("state", self.state.as_deref(), 50)?;
    check_opt_len("zip_code", self.zip_code.as_deref(), 20)?;
    Ok(())
  }
}

pub(crate) fn check_len(
  field: &'static str,
  value: &str,
  min: usize,
  max: usize,
) -> Result<()> {
  let len = value.trim().chars().count();
  if len < min {
    return Err(Error::validation(field, "must not be empty"));
  }
  if len > max {
    return Err(Error::validation(field, format!("longer than {max} characters")));
  }
  Ok(())
}

pub(crate) fn check_opt_len(
  field: &'static str,
  value: Option<&str>,
  max: usize,
) -> Result<()> {
  match value {
    Some(v) if v.chars().count() > max => {
      Err(Error::validation(field, format!("longer than {max} characters")))
    }
    _ => Ok(()),
  }
}
