//! Core types, rules, and the storage port for the POC completion ledger.
//!
//! No HTTP or database dependencies live here. Storage backends implement
//! [`store::PocStore`] and [`store::KeyRegistry`]; callers go through
//! [`engine::Engine`].

// Backends implement the storage traits with native `async fn`.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod engine;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod period;
pub mod record;
pub mod report;
pub mod rules;
pub mod store;

pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
pub use key::ProjectPhaseKey;
pub use period::{
  DateCheck, Period, RecognitionType, classify, is_month_end,
  validate_completion_date,
};
