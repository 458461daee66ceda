//! Error type for `poc-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] poc_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("redistribution not found: {0}")]
  RedistributionNotFound(uuid::Uuid),

  #[error("redistribution {0} is already resolved")]
  AlreadyResolved(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `BUSY` and `LOCKED` mean another writer holds the database; everything
/// else from SQLite is a storage failure.
fn classify_sqlite(e: &rusqlite::Error) -> poc_core::Error {
  match e.sqlite_error_code() {
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
      poc_core::Error::Concurrency(e.to_string())
    }
    _ => poc_core::Error::Storage(e.to_string()),
  }
}

impl From<Error> for poc_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      Error::Sqlite(ref inner) => classify_sqlite(inner),
      Error::Database(tokio_rusqlite::Error::Rusqlite(ref inner)) => {
        classify_sqlite(inner)
      }
      Error::Database(tokio_rusqlite::Error::ConnectionClosed) => {
        poc_core::Error::Storage("database connection is closed".into())
      }
      Error::Database(other) => poc_core::Error::Storage(other.to_string()),
      Error::Uuid(_) | Error::DateParse(_) => {
        poc_core::Error::Storage(format!("corrupt row: {e}"))
      }
      Error::RedistributionNotFound(_) => poc_core::Error::Validation(e.to_string()),
      Error::AlreadyResolved(_) => poc_core::Error::Precondition(e.to_string()),
    }
  }
}
