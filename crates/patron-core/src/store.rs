//! The `DonorStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `patron-store-sqlite`).
//! Higher layers (`patron-api`, `patron-server`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Every operation takes the caller's organization; records belonging to
//! another organization behave exactly as if they did not exist.

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  donation::{Donation, DonationType, NewDonation},
  donor::{Donor, DonorStatus, NewDonor, RetentionRisk},
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 500;
/// How many recent donations a [`DonorSnapshot`] carries.
pub const SNAPSHOT_RECENT_DONATIONS: u32 = 10;

// ─── Query types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonorSort {
  #[default]
  FirstName,
  LastName,
  TotalAmount,
  LastGiftDate,
  CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationSort {
  #[default]
  Date,
  Amount,
  CreatedAt,
}

/// One-based pagination. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page:  u32,
  pub limit: u32,
}

impl PageRequest {
  pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
    Self {
      page:  page.unwrap_or(1).max(1),
      limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    }
  }

  pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

impl Default for PageRequest {
  fn default() -> Self { Self::new(None, None) }
}

/// Parameters for [`DonorStore::list_donors`].
#[derive(Debug, Clone, Default)]
pub struct DonorQuery {
  /// Case-insensitive match on first or last name; also on email when the
  /// term contains `@`.
  pub search:         Option<String>,
  pub status:         Option<DonorStatus>,
  pub retention_risk: Option<RetentionRisk>,
  pub sort_by:        DonorSort,
  pub sort_order:     SortOrder,
  pub page:           PageRequest,
}

/// Parameters for [`DonorStore::list_donations`]. Defaults to newest first.
#[derive(Debug, Clone)]
pub struct DonationQuery {
  pub donor_id:   Option<Uuid>,
  pub sort_by:    DonationSort,
  pub sort_order: SortOrder,
  pub page:       PageRequest,
}

impl Default for DonationQuery {
  fn default() -> Self {
    Self {
      donor_id:   None,
      sort_by:    DonationSort::Date,
      sort_order: SortOrder::Desc,
      page:       PageRequest::default(),
    }
  }
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:       Vec<T>,
  pub total:       u64,
  pub page:        u32,
  pub limit:       u32,
  pub total_pages: u64,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
    Self {
      items,
      total,
      page: request.page,
      limit: request.limit,
      total_pages: total.div_ceil(u64::from(request.limit)),
    }
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// A gift as exposed in a [`DonorSnapshot`]: no notes, no payment details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentGift {
  pub amount:        Decimal,
  pub date:          DateTime<Utc>,
  #[serde(rename = "type")]
  pub donation_type: DonationType,
}

/// Anonymised giving metrics for a single donor, the precomputed input for
/// downstream summarisation. Carries no contact fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorSnapshot {
  pub total_gifts:      u32,
  pub total_amount:     Decimal,
  pub first_gift_date:  Option<DateTime<Utc>>,
  pub last_gift_date:   Option<DateTime<Utc>>,
  pub retention_risk:   RetentionRisk,
  pub status:           DonorStatus,
  /// Newest first, at most [`SNAPSHOT_RECENT_DONATIONS`] entries.
  pub recent_donations: Vec<RecentGift>,
}

impl DonorSnapshot {
  pub fn new(donor: &Donor, recent: &[Donation]) -> Self {
    Self {
      total_gifts:      donor.total_gifts,
      total_amount:     donor.total_amount,
      first_gift_date:  donor.first_gift_date,
      last_gift_date:   donor.last_gift_date,
      retention_risk:   donor.retention_risk,
      status:           donor.status,
      recent_donations: recent
        .iter()
        .map(|d| RecentGift {
          amount:        d.amount,
          date:          d.date,
          donation_type: d.donation_type,
        })
        .collect(),
    }
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend-independent classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// The referenced record does not exist in the caller's organization.
  NotFound,
  /// The input was rejected before anything was written.
  Validation,
  /// The storage layer failed; the unit of work was rolled back.
  Storage,
}

pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> FailureKind;
}

impl StoreError for crate::Error {
  fn kind(&self) -> FailureKind {
    match self {
      Self::DonorNotFound(_) => FailureKind::NotFound,
      Self::InvalidAmount(_) | Self::TotalOverflow(_) | Self::Validation { .. } => {
        FailureKind::Validation
      }
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Patron storage backend.
///
/// Donations are append-only. The only mutation of a donor's aggregate
/// fields is the recompute performed by [`DonorStore::record_donation`] and
/// [`DonorStore::refresh_aggregates`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait DonorStore: Send + Sync {
  type Error: StoreError;

  // ── Donors ────────────────────────────────────────────────────────────

  /// Create a donor in `organization_id` with an empty aggregate.
  fn add_donor(
    &self,
    organization_id: Uuid,
    input: NewDonor,
  ) -> impl Future<Output = Result<Donor, Self::Error>> + Send + '_;

  /// Retrieve a donor by UUID. Returns `None` if not found in scope.
  fn get_donor(
    &self,
    organization_id: Uuid,
    donor_id: Uuid,
  ) -> impl Future<Output = Result<Option<Donor>, Self::Error>> + Send + '_;

  fn list_donors<'a>(
    &'a self,
    organization_id: Uuid,
    query: &'a DonorQuery,
  ) -> impl Future<Output = Result<Page<Donor>, Self::Error>> + Send + 'a;

  // ── Donations ─────────────────────────────────────────────────────────

  /// Record a donation and recompute the donor's aggregate in one atomic
  /// unit of work. Either both writes are committed or neither is.
  fn record_donation(
    &self,
    organization_id: Uuid,
    input: NewDonation,
  ) -> impl Future<Output = Result<Donation, Self::Error>> + Send + '_;

  fn list_donations<'a>(
    &'a self,
    organization_id: Uuid,
    query: &'a DonationQuery,
  ) -> impl Future<Output = Result<Page<Donation>, Self::Error>> + Send + 'a;

  // ── Derived views ─────────────────────────────────────────────────────

  /// Anonymised metrics for one donor. Returns `None` if not found in scope.
  fn donor_snapshot(
    &self,
    organization_id: Uuid,
    donor_id: Uuid,
  ) -> impl Future<Output = Result<Option<DonorSnapshot>, Self::Error>> + Send + '_;

  /// Recompute every donor of `organization_id` as of `as_of`, returning the
  /// number of donors refreshed.
  fn refresh_aggregates(
    &self,
    organization_id: Uuid,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
