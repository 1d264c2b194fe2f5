//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so they sort lexically. Money is stored as the exact
//! decimal string. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use patron_core::{
  donation::{Donation, DonationType},
  donor::{Donor, DonorStatus, RetentionRisk},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_status(s: DonorStatus) -> &'static str {
  match s {
    DonorStatus::Active => "active",
    DonorStatus::Lapsed => "lapsed",
    DonorStatus::Inactive => "inactive",
    DonorStatus::DoNotContact => "do_not_contact",
  }
}

pub fn decode_status(s: &str) -> Result<DonorStatus> {
  match s {
    "active" => Ok(DonorStatus::Active),
    "lapsed" => Ok(DonorStatus::Lapsed),
    "inactive" => Ok(DonorStatus::Inactive),
    "do_not_contact" => Ok(DonorStatus::DoNotContact),
    other => Err(unknown("status", other)),
  }
}

pub fn encode_risk(r: RetentionRisk) -> &'static str {
  match r {
    RetentionRisk::Unknown => "unknown",
    RetentionRisk::Low => "low",
    RetentionRisk::Medium => "medium",
    RetentionRisk::High => "high",
    RetentionRisk::Critical => "critical",
  }
}

pub fn decode_risk(s: &str) -> Result<RetentionRisk> {
  match s {
    "unknown" => Ok(RetentionRisk::Unknown),
    "low" => Ok(RetentionRisk::Low),
    "medium" => Ok(RetentionRisk::Medium),
    "high" => Ok(RetentionRisk::High),
    "critical" => Ok(RetentionRisk::Critical),
    other => Err(unknown("retention_risk", other)),
  }
}

pub fn encode_donation_type(t: DonationType) -> &'static str {
  match t {
    DonationType::OneTime => "one_time",
    DonationType::Recurring => "recurring",
    DonationType::Pledge => "pledge",
    DonationType::InKind => "in_kind",
  }
}

pub fn decode_donation_type(s: &str) -> Result<DonationType> {
  match s {
    "one_time" => Ok(DonationType::OneTime),
    "recurring" => Ok(DonationType::Recurring),
    "pledge" => Ok(DonationType::Pledge),
    "in_kind" => Ok(DonationType::InKind),
    other => Err(unknown("donation_type", other)),
  }
}

fn unknown(column: &'static str, value: &str) -> Error {
  Error::UnknownVariant { column, value: value.to_owned() }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order read by [`RawDonor::from_row`].
pub const DONOR_COLUMNS: &str = "donor_id, organization_id, first_name, last_name, \
  email, phone, address, city, state, zip_code, status, total_gifts, total_amount, \
  first_gift_date, last_gift_date, retention_risk, created_at, updated_at";

/// Raw values read directly from a `donors` row.
pub struct RawDonor {
  pub donor_id:        String,
  pub organization_id: String,
  pub first_name:      String,
  pub last_name:       String,
  pub email:           Option<String>,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub city:            Option<String>,
  pub state:           Option<String>,
  pub zip_code:        Option<String>,
  pub status:          String,
  pub total_gifts:     u32,
  pub total_amount:    String,
  pub first_gift_date: Option<String>,
  pub last_gift_date:  Option<String>,
  pub retention_risk:  String,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawDonor {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      donor_id:        row.get(0)?,
      organization_id: row.get(1)?,
      first_name:      row.get(2)?,
      last_name:       row.get(3)?,
      email:           row.get(4)?,
      phone:           row.get(5)?,
      address:         row.get(6)?,
      city:            row.get(7)?,
      state:           row.get(8)?,
      zip_code:        row.get(9)?,
      status:          row.get(10)?,
      total_gifts:     row.get(11)?,
      total_amount:    row.get(12)?,
      first_gift_date: row.get(13)?,
      last_gift_date:  row.get(14)?,
      retention_risk:  row.get(15)?,
      created_at:      row.get(16)?,
      updated_at:      row.get(17)?,
    })
  }

  pub fn into_donor(self) -> Result<Donor> {
    Ok(Donor {
      donor_id:        decode_uuid(&self.donor_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      first_name:      self.first_name,
      last_name:       self.last_name,
      email:           self.email,
      phone:           self.phone,
      address:         self.address,
      city:            self.city,
      state:           self.state,
      zip_code:        self.zip_code,
      status:          decode_status(&self.status)?,
      total_gifts:     self.total_gifts,
      total_amount:    decode_decimal(&self.total_amount)?,
      first_gift_date: self.first_gift_date.as_deref().map(decode_dt).transpose()?,
      last_gift_date:  self.last_gift_date.as_deref().map(decode_dt).transpose()?,
      retention_risk:  decode_risk(&self.retention_risk)?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching the field order read by [`RawDonation::from_row`].
pub const DONATION_COLUMNS: &str = "donation_id, donor_id, campaign_id, amount, date, \
  donation_type, method, notes, idempotency_key, created_at";

/// Raw values read directly from a `donations` row.
pub struct RawDonation {
  pub donation_id:     String,
  pub donor_id:        String,
  pub campaign_id:     Option<String>,
  pub amount:          String,
  pub date:            String,
  pub donation_type:   String,
  pub method:          Option<String>,
  pub notes:           Option<String>,
  pub idempotency_key: Option<String>,
  pub created_at:      String,
}

impl RawDonation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      donation_id:     row.get(0)?,
      donor_id:        row.get(1)?,
      campaign_id:     row.get(2)?,
      amount:          row.get(3)?,
      date:            row.get(4)?,
      donation_type:   row.get(5)?,
      method:          row.get(6)?,
      notes:           row.get(7)?,
      idempotency_key: row.get(8)?,
      created_at:      row.get(9)?,
    })
  }

  pub fn into_donation(self) -> Result<Donation> {
    Ok(Donation {
      donation_id:     decode_uuid(&self.donation_id)?,
      donor_id:        decode_uuid(&self.donor_id)?,
      campaign_id:     self.campaign_id.as_deref().map(decode_uuid).transpose()?,
      amount:          decode_decimal(&self.amount)?,
      date:            decode_dt(&self.date)?,
      donation_type:   decode_donation_type(&self.donation_type)?,
      method:          self.method,
      notes:           self.notes,
      idempotency_key: self.idempotency_key,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
