//! JSON REST API for the POC completion ledger.
//!
//! Exposes an axum [`Router`] backed by an [`Engine`] over any store that
//! implements [`PocStore`] and [`KeyRegistry`]. Auth, TLS, and transport
//! concerns are the caller's responsibility; mutating requests name their
//! actor in the body.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", poc_api::api_router(engine.clone()))
//! ```

pub mod completion;
pub mod dates;
pub mod error;
pub mod params;
pub mod poc;
pub mod redistributions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use poc_core::{
  Engine,
  store::{KeyRegistry, PocStore},
};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<Engine<S>>) -> Router<()>
where
  S: PocStore + KeyRegistry + 'static,
{
  Router::new()
    // Pure helpers
    .route("/classify", get(dates::classify_period))
    .route("/month-end", get(dates::month_end))
    .route("/completion-dates/validate", post(dates::validate::<S>))
    // Completion ledger
    .route(
      "/completion-dates",
      get(completion::show::<S>).post(completion::append::<S>),
    )
    .route("/completion-dates/check", post(completion::check::<S>))
    .route("/completion-dates/commit", post(completion::commit::<S>))
    // POC values
    .route("/poc", get(poc::report::<S>).post(poc::upsert::<S>))
    // Redistribution
    .route("/redistributions", get(redistributions::list::<S>))
    .route(
      "/redistributions/{id}/resolve",
      post(redistributions::resolve::<S>),
    )
    .with_state(engine)
}
