//! Handlers for `/donations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/donations` | `?donor_id=&sort_by=date\|amount\|created_at&sort_order=&page=&limit=` |
//! | `POST` | `/donations` | Records the gift and updates the donor's aggregate atomically |
//!
//! A `POST` naming a donor outside the caller's organization is a 404, the
//! same as a donor that does not exist.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use patron_core::{
  donation::{Donation, NewDonation},
  store::{DonationQuery, DonationSort, DonorStore, Page, PageRequest, SortOrder},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, organization::Organization};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub donor_id:   Option<Uuid>,
  pub sort_by:    Option<DonationSort>,
  pub sort_order: Option<SortOrder>,
  pub page:       Option<u32>,
  pub limit:      Option<u32>,
}

impl From<ListParams> for DonationQuery {
  fn from(p: ListParams) -> Self {
    let defaults = DonationQuery::default();
    Self {
      donor_id:   p.donor_id,
      sort_by:    p.sort_by.unwrap_or(defaults.sort_by),
      sort_order: p.sort_order.unwrap_or(defaults.sort_order),
      page:       PageRequest::new(p.page, p.limit),
    }
  }
}

/// `GET /donations`
pub async fn list<S: DonorStore>(
  State(store): State<Arc<S>>,
  Organization(org): Organization,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Donation>>, ApiError> {
  let query = DonationQuery::from(params);
  let page = store.list_donations(org, &query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Record ───────────────────────────────────────────────────────────────────

/// `POST /donations`, body: `{"donor_id":"…","amount":"25.00","date":"…"}`
pub async fn create<S: DonorStore>(
  State(store): State<Arc<S>>,
  Organization(org): Organization,
  Json(body): Json<NewDonation>,
) -> Result<impl IntoResponse, ApiError> {
  let donation = store.record_donation(org, body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(donation)))
}
