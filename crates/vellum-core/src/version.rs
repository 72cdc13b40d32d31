//! Document keys and policy versions — the fundamental units of the ledger.
//!
//! A version is an immutable content snapshot. Once its row is written, only
//! its lifecycle status (and the `superseded_by` pointer) ever changes; the
//! content hash, chunks and metadata are frozen.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::VersionStatus;

// ─── DocumentKey ─────────────────────────────────────────────────────────────

/// Stable identifier for one policy across all of its versions.
///
/// Derived from the staged filename, never from content — content changes
/// across versions and the key must not.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
  pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

  /// Deterministic key derivation: strip the final extension, lowercase,
  /// and collapse every run of non-alphanumeric characters into a single
  /// hyphen. `"HR Policy_v2 (final).PDF"` and `"hr-policy-v2-final.pdf"`
  /// map to the same key.
  pub fn from_filename(filename: &str) -> Self {
    let stem = match filename.rsplit_once('.') {
      Some((stem, _ext)) if !stem.is_empty() => stem,
      _ => filename,
    };

    let mut key = String::with_capacity(stem.len());
    let mut pending_sep = false;
    for c in stem.chars() {
      if c.is_alphanumeric() {
        if pending_sep && !key.is_empty() {
          key.push('-');
        }
        pending_sep = false;
        key.extend(c.to_lowercase());
      } else {
        pending_sep = true;
      }
    }
    Self(key)
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DocumentKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Structured payload handed back by the extraction adapter. The core stores
/// it verbatim and never interprets it; `extra` is the escape hatch for
/// adapter-specific fields (applicability flags, checkbox state, …).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
  pub title:     Option<String>,
  /// Human-facing policy reference number (e.g. "HR-014"). Distinct from
  /// the document key, which is filename-derived.
  pub reference: Option<String>,
  pub sections:  Vec<String>,
  #[serde(default)]
  pub extra:     serde_json::Value,
}

// ─── PolicyVersion ───────────────────────────────────────────────────────────

/// One immutable content snapshot of a document, with a lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVersion {
  /// Identity of this version in the chunk index. Minted by the caller
  /// before any write so chunks can be tagged ahead of the ledger row.
  pub version_id:      Uuid,
  pub document_key:    DocumentKey,
  /// Ledger-assigned, starts at 1, strictly increasing per key. Never
  /// supplied by callers; never reused.
  pub version_number:  i64,
  /// Lowercase hex SHA-256 of the document bytes at this version.
  pub content_hash:    String,
  pub status:          VersionStatus,
  /// When this version was recorded; store-assigned.
  pub version_date:    DateTime<Utc>,
  /// When this version governs, if known.
  pub effective_date:  Option<NaiveDate>,
  pub expiration_date: Option<NaiveDate>,
  /// Forward pointer to the version that replaced this one.
  pub superseded_by:   Option<i64>,
  /// Chunks derived from this version, in extraction order. Owned
  /// exclusively by this version; never shared, never mutated.
  pub chunk_ids:       Vec<Uuid>,
  /// The staged filename this version was ingested from.
  pub source_file:     String,
  pub metadata:        DocumentMetadata,
}

// ─── NewVersion ──────────────────────────────────────────────────────────────

/// Input to [`VersionLedger::ingest`](crate::ledger::VersionLedger::ingest).
/// `version_number` and `version_date` are always assigned by the ledger.
#[derive(Debug, Clone)]
pub struct NewVersion {
  pub document_key:   DocumentKey,
  pub version_id:     Uuid,
  pub content_hash:   String,
  /// `Draft` or `Active`; any other status is rejected.
  pub initial_status: VersionStatus,
  pub effective_date: Option<NaiveDate>,
  pub chunk_ids:      Vec<Uuid>,
  pub source_file:    String,
  pub metadata:       DocumentMetadata,
}

impl NewVersion {
  /// Convenience constructor for direct-to-ACTIVE ingest.
  pub fn active(
    document_key: DocumentKey,
    version_id: Uuid,
    content_hash: impl Into<String>,
    chunk_ids: Vec<Uuid>,
    source_file: impl Into<String>,
    metadata: DocumentMetadata,
  ) -> Self {
    Self {
      document_key,
      version_id,
      content_hash: content_hash.into(),
      initial_status: VersionStatus::Active,
      effective_date: None,
      chunk_ids,
      source_file: source_file.into(),
      metadata,
    }
  }
}

// ─── Ledger write outcomes ───────────────────────────────────────────────────

/// A version displaced by an ingest — enough identity for the caller to flip
/// its chunk-index status and archive its file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Displaced {
  pub version_number: i64,
  pub version_id:     Uuid,
  pub source_file:    String,
}

/// Result of [`VersionLedger::ingest`](crate::ledger::VersionLedger::ingest).
#[derive(Debug, Clone)]
pub enum Ingest {
  /// A new version row was written. If the document previously had an
  /// ACTIVE version it was superseded in the same transaction.
  Created {
    version:    PolicyVersion,
    superseded: Option<Displaced>,
  },
  /// An existing non-retired version of this document already carries this
  /// content hash; nothing was written. This no-op is what makes re-running
  /// a sync plan idempotent.
  Unchanged { version_number: i64 },
}

/// Reference to one side of a rollback swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRef {
  pub version_number: i64,
  pub version_id:     Uuid,
}

/// Result of the atomic rollback pair: the previously-ACTIVE version was
/// demoted to SUPERSEDED and the target promoted to ACTIVE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reversal {
  pub document_key: DocumentKey,
  pub demoted:      VersionRef,
  pub promoted:     VersionRef,
  pub reason:       String,
  pub recorded_at:  DateTime<Utc>,
}

// ─── Audit log ───────────────────────────────────────────────────────────────

/// One row of the append-only transition audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub document_key:   DocumentKey,
  pub version_number: i64,
  /// `None` for the creation pseudo-transition.
  pub from:           Option<VersionStatus>,
  pub to:             VersionStatus,
  pub reason:         Option<String>,
  pub recorded_at:    DateTime<Utc>,
}
