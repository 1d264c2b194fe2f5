//! JSON REST API for Patron.
//!
//! Exposes an axum [`Router`] backed by any [`patron_core::store::DonorStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility; the
//! caller's organization arrives in the `X-Organization-Id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", patron_api::api_router(store.clone()))
//! ```

pub mod donations;
pub mod donors;
pub mod error;
pub mod organization;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use patron_core::store::DonorStore;

pub use error::ApiError;
pub use organization::{ORGANIZATION_HEADER, Organization};

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: DonorStore + 'static,
{
  Router::new()
    // Donors
    .route("/donors", get(donors::list::<S>).post(donors::create::<S>))
    .route("/donors/refresh", post(donors::refresh::<S>))
    .route("/donors/{id}", get(donors::get_one::<S>))
    .route("/donors/{id}/snapshot", get(donors::snapshot::<S>))
    // Donations
    .route("/donations", get(donations::list::<S>).post(donations::create::<S>))
    .with_state(store)
}
