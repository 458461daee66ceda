//! SQLite backend for the POC completion ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation is a single
//! `BEGIN IMMEDIATE` transaction.

mod encode;
mod ledger;
mod poc;
mod redistribution;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_BUSY_TIMEOUT, SqliteStore};

#[cfg(test)]
mod tests;
