//! Error type for `vellum-engine`.
//!
//! The orchestrator is generic over its collaborators, so their error types
//! arrive boxed. Per-document failures are folded into the sync report;
//! `SyncError` itself surfaces only where an operation fails as a whole
//! (listing staging, a rollback precondition, …).

use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("ledger error: {0}")]
  Ledger(BoxedError),

  #[error("extraction failed: {0}")]
  Extraction(BoxedError),

  #[error("chunk index error: {0}")]
  Index(BoxedError),

  #[error("file store error: {0}")]
  Files(BoxedError),

  #[error("{stage} timed out after {seconds}s")]
  Timeout { stage: &'static str, seconds: u64 },
}

impl SyncError {
  pub fn ledger(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Ledger(Box::new(e))
  }

  pub fn extraction(
    e: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self::Extraction(Box::new(e))
  }

  pub fn index(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Index(Box::new(e))
  }

  pub fn files(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Files(Box::new(e))
  }
}
