//! HTTP server assembly for the POC completion ledger.
//!
//! Loads [`ServerConfig`], opens the SQLite store, seeds the project/phase
//! allow-list, and mounts [`poc_api::api_router`] under `/api`.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use axum::{Router, routing::get};
use chrono::NaiveDate;
use poc_core::{
  Engine, ProjectPhaseKey,
  store::{KeyRegistry, PocStore},
};
use poc_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `POC_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  pub store_path:      PathBuf,
  /// How long a write waits for a competing writer before failing with a
  /// concurrency error.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
  /// Keys registered at startup. Existing keys are left alone.
  #[serde(default)]
  pub project_phases:  Vec<ProjectPhaseKey>,
  /// Pin "today" for completion-date validation. Unset means the UTC date.
  #[serde(default)]
  pub today:           Option<NaiveDate>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_busy_timeout_ms() -> u64 { 5_000 }

impl ServerConfig {
  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Startup ──────────────────────────────────────────────────────────────────

/// Open the store at `cfg.store_path` (already tilde-expanded by the caller),
/// register the configured keys, and build the engine.
pub async fn open_engine(cfg: &ServerConfig) -> anyhow::Result<Engine<SqliteStore>> {
  let store = SqliteStore::open_with_timeout(&cfg.store_path, cfg.busy_timeout())
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  for key in &cfg.project_phases {
    if store
      .register_key(key.clone())
      .await
      .with_context(|| format!("failed to register {key}"))?
    {
      tracing::info!(%key, "registered project phase");
    }
  }

  let engine = Engine::new(Arc::new(store));
  Ok(match cfg.today {
    Some(today) => engine.with_today(today),
    None => engine,
  })
}

// ─── Router ───────────────────────────────────────────────────────────────────

async fn health() -> &'static str { "ok" }

/// The full application: `/health` plus the API under `/api`, with request
/// tracing.
pub fn router<S>(engine: Arc<Engine<S>>) -> Router
where
  S: PocStore + KeyRegistry + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", poc_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}
