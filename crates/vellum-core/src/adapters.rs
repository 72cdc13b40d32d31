//! External collaborator interfaces: extraction, the chunk index, and the
//! physical file store.
//!
//! The engine consumes these; it never builds them. PDF layout heuristics,
//! vector search internals and blob storage all live behind these seams.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  chunk::{ChunkText, IndexedChunk},
  status::VersionStatus,
  version::DocumentMetadata,
};

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Output of one extraction pass over a document's bytes.
#[derive(Debug, Clone)]
pub struct Extraction {
  pub metadata: DocumentMetadata,
  pub chunks:   Vec<ChunkText>,
}

/// Turns raw document bytes into ordered chunks plus structured metadata.
///
/// Implementations may chain several strategies internally; to the engine a
/// failure is a failure of the whole document, recorded per-document and
/// never fatal to a batch.
pub trait Extractor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn extract(
    &self,
    bytes: Vec<u8>,
  ) -> impl Future<Output = Result<Extraction, Self::Error>> + Send + '_;
}

// ─── Chunk index ─────────────────────────────────────────────────────────────

/// The search index, keyed by the owning version's `version_id`.
///
/// Superseding or retiring a version never deletes its chunks; their status
/// flips so they drop out of default (`status = active`) queries while
/// remaining queryable for audit. `delete_by_version` is the separate, rare
/// compliance-erasure path.
pub trait ChunkIndex: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn upsert(
    &self,
    version_id: Uuid,
    status: VersionStatus,
    chunks: Vec<IndexedChunk>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn set_status(
    &self,
    version_id: Uuid,
    status: VersionStatus,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Hard-delete every chunk of a version. Compliance erasure only; the
  /// normal lifecycle never calls this.
  fn delete_by_version(
    &self,
    version_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── File store ──────────────────────────────────────────────────────────────

/// The three physical locations a document file moves between.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Location {
  /// The source-of-truth drop location scanned by `detect`.
  Staging,
  /// Files whose version is currently ACTIVE.
  Active,
  /// Displaced and retired files; nothing here is ever overwritten.
  Archive,
}

impl Location {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Staging => "staging",
      Self::Active => "active",
      Self::Archive => "archive",
    }
  }
}

/// Physical document storage. Listings are returned in lexicographic order
/// so classification is deterministic.
pub trait DocumentFiles: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn list(
    &self,
    location: Location,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  fn read(
    &self,
    location: Location,
    filename: String,
  ) -> impl Future<Output = Result<Vec<u8>, Self::Error>> + Send + '_;

  /// Copy a file between locations, leaving the source in place. Used to
  /// publish staged files into the active location — staging stays the
  /// source of truth, so an unchanged re-run still sees the file.
  fn copy_document(
    &self,
    filename: String,
    from: Location,
    to: Location,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Move a file between locations. Moves into the archive must never
  /// overwrite an existing file.
  fn move_document(
    &self,
    filename: String,
    from: Location,
    to: Location,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
