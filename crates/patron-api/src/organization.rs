//! The caller's organization, read from the `X-Organization-Id` header.
//!
//! Authentication happens in front of this service; whatever sits there is
//! expected to set the header. Every handler scopes its store calls to it.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Extractor for the organization a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Organization(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for Organization {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let value = parts
      .headers
      .get(ORGANIZATION_HEADER)
      .ok_or_else(|| ApiError::BadRequest("missing X-Organization-Id header".into()))?;
    let id = value
      .to_str()
      .ok()
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .ok_or_else(|| ApiError::BadRequest("X-Organization-Id is not a valid UUID".into()))?;
    Ok(Self(id))
  }
}
