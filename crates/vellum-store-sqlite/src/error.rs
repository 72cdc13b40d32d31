//! Error type for `vellum-store-sqlite`.

use thiserror::Error;
use vellum_core::status::VersionStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain-level failures (not-found, illegal transitions, invariant
  /// violations) are expressed with the core taxonomy.
  #[error(transparent)]
  Core(#[from] vellum_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown status discriminant in database: {0:?}")]
  UnknownStatus(String),

  #[error("initial status must be draft or active, got {0}")]
  BadInitialStatus(VersionStatus),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
