//! HTTP service wiring for Patron: configuration and the top-level router.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use patron_core::store::DonorStore;
use patron_store_sqlite::StoreOptions;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `patron.toml` and
/// `PATRON_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// How long a write waits on another connection's lock, in milliseconds.
  pub busy_timeout_ms: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_string(),
      port:            8080,
      store_path:      PathBuf::from("~/.local/share/patron/patron.db"),
      busy_timeout_ms: 5_000,
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions { busy_timeout: Duration::from_millis(self.busy_timeout_ms) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application: the JSON API under `/api`, traced.
pub fn app<S>(store: Arc<S>) -> Router
where
  S: DonorStore + 'static,
{
  Router::new()
    .nest("/api", patron_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}
