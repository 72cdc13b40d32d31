//! The Vellum sync engine: content addressing, the sync orchestrator, the
//! rollback manager, and local-filesystem document storage.
//!
//! Everything here works against the trait seams in `vellum-core`; the
//! concrete ledger and index backends are injected by the caller.

mod error;
mod extract;
mod files;
mod hash;
mod orchestrator;
mod rollback;

pub use error::SyncError;
pub use extract::{ExtractError, PlainTextExtractor};
pub use files::LocalDocumentFiles;
pub use hash::{fingerprint, fingerprint_bytes};
pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use rollback::RollbackManager;

#[cfg(test)]
mod tests;
