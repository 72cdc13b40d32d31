//! Error types for `vellum-core`.

use thiserror::Error;

use crate::{status::VersionStatus, version::DocumentKey};

#[derive(Debug, Error)]
pub enum Error {
  #[error("no version {version} recorded for document {key}")]
  VersionNotFound { key: DocumentKey, version: i64 },

  #[error("document {0} has no active version")]
  NoActiveVersion(DocumentKey),

  #[error(
    "illegal transition {from} -> {to} for document {key} version {version}"
  )]
  InvalidTransition {
    key:     DocumentKey,
    version: i64,
    from:    VersionStatus,
    to:      VersionStatus,
  },

  /// A write would have left a document with two ACTIVE versions (or zero,
  /// in the middle of a paired swap). Indicates a bug or a concurrent
  /// modification race, never a normal operating condition.
  #[error("invariant violation for document {key}: {detail}")]
  InvariantViolation { key: DocumentKey, detail: String },

  #[error("rollback of document {key} requires a non-empty reason")]
  MissingReason { key: DocumentKey },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
