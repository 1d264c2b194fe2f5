//! Handlers for `/donors` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/donors` | `?search=&status=&risk=&sort_by=&sort_order=&page=&limit=` |
//! | `POST` | `/donors` | Body: `{"first_name":"Ada","last_name":"Lovelace"}` |
//! | `GET`  | `/donors/{id}` | 404 if not found in the caller's organization |
//! | `GET`  | `/donors/{id}/snapshot` | Anonymised giving metrics |
//! | `POST` | `/donors/refresh` | Optional `?as_of=<rfc3339>`; reclassifies every donor |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use patron_core::{
  donor::{Donor, DonorStatus, NewDonor, RetentionRisk},
  store::{DonorQuery, DonorSnapshot, DonorSort, DonorStore, Page, PageRequest, SortOrder},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{error::ApiError, organization::Organization};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub search:     Option<String>,
  pub status:     Option<DonorStatus>,
  pub risk:       Option<RetentionRisk>,
  pub sort_by:    Option<DonorSort>,
  pub sort_order: Option<SortOrder>,
  pub page:       Option<u32>,
  pub limit:      Option<u32>,
}

impl From<ListParams> for DonorQuery {
  fn from(p: ListParams) -> Self {
    Self {
      search:         p.search,
      status:         p.status,
      retention_risk: p.risk,
      sort_by:        p.sort_by.unwrap_or_default(),
      sort_order:     p.sort_order.unwrap_or_default(),
      page:           PageRequest::new(p.page, p.limit),
    }
  }
}

/// `GET /donors`
pub async fn list<S: DonorStore>(
  State(store): State<Arc<S>>,
  Organization(org): Organization,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Donor>>, ApiError> {
  let query = DonorQuery::from(params);
  let page = store.list_donors(org, &query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /donors`
pub async fn create<S: DonorStore>(
  State(store): State<Arc<S>>,
  Organization(org): Organization,
  Json(body): Json<NewDonor>,
) -> Result<impl IntoResponse, ApiError> {
  let donor = store.add_donor(org, body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(donor)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /donors/{id}`
pub async fn get_one<S: DonorStore>(
  State(store): State<Arc<S>>,
  Organization(org): Organization,
  Path(id): Path<Uuid>,
) -> Result<Json<Donor>, ApiError> {
  let donor = store
    .get_donor(org, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("donor {id} not found")))?;
  Ok(Json(donor))
}

/// `GET /donors/{id}/snapshot`
pub async fn snapshot<S: DonorStore>(
  State(store): State<Arc<S>>,
  Organization(org): Organization,
  Path(id): Path<Uuid>,
) -> Result<Json<DonorSnapshot>, ApiError> {
  let snapshot = store
    .donor_snapshot(org, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("donor {id} not found")))?;
  Ok(Json(snapshot))
}

// ─── Refresh ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefreshParams {
  pub as_of: Option<DateTime<Utc>>,
}

/// `POST /donors/refresh`
pub async fn refresh<S: DonorStore>(
  State(store): State<Arc<S>>,
  Organization(org): Organization,
  Query(params): Query<RefreshParams>,
) -> Result<Json<Value>, ApiError> {
  let as_of = params.as_of.unwrap_or_else(Utc::now);
  let refreshed = store
    .refresh_aggregates(org, as_of)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "refreshed": refreshed })))
}
