//! The `VersionLedger` trait — the authoritative record of every document's
//! version history.
//!
//! Implemented by storage backends (e.g. `vellum-store-sqlite`). The engine
//! and CLI depend on this abstraction, not on any concrete backend. The
//! ledger is the single source of truth for status; physical file locations
//! are a derived reflection of it.
//!
//! All methods return `Send` futures so the trait can be used from a
//! multi-threaded async runtime.

use std::future::Future;

use crate::{
  status::VersionStatus,
  version::{
    DocumentKey, Ingest, NewVersion, PolicyVersion, Reversal,
    TransitionRecord,
  },
};

pub trait VersionLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Record a new version of a document.
  ///
  /// If a non-RETIRED version of this key already carries `content_hash`,
  /// nothing is written and [`Ingest::Unchanged`] is returned — duplicate
  /// ingest is an idempotent no-op, not an error.
  ///
  /// When `initial_status` is `Active` and the document already has an
  /// ACTIVE version, that version is marked SUPERSEDED (with its
  /// `superseded_by` pointing at the new number) in the same transaction as
  /// the insert, so the single-ACTIVE invariant never transiently breaks.
  ///
  /// `version_number` is assigned by the ledger — strictly increasing per
  /// key, starting at 1.
  fn ingest(
    &self,
    new: NewVersion,
  ) -> impl Future<Output = Result<Ingest, Self::Error>> + Send + '_;

  /// Move one version along a single edge of the state machine.
  ///
  /// Fails if the edge is not in the transition table, if the version does
  /// not exist, or if the move would leave the document with two ACTIVE
  /// versions. `reason` is recorded in the audit log.
  fn transition(
    &self,
    key: DocumentKey,
    version_number: i64,
    new_status: VersionStatus,
    reason: Option<String>,
  ) -> impl Future<Output = Result<PolicyVersion, Self::Error>> + Send + '_;

  /// The atomic rollback pair: demote the current ACTIVE version to
  /// SUPERSEDED and promote `target_version` (SUPERSEDED or RETIRED) to
  /// ACTIVE, clearing its `superseded_by` pointer. One transaction — a
  /// document is never observable with zero or two ACTIVE versions.
  ///
  /// The non-empty `reason` is mandatory and recorded in the audit log.
  fn rollback(
    &self,
    key: DocumentKey,
    target_version: i64,
    reason: String,
  ) -> impl Future<Output = Result<Reversal, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The single ACTIVE version of a document, if any.
  fn get_active(
    &self,
    key: DocumentKey,
  ) -> impl Future<Output = Result<Option<PolicyVersion>, Self::Error>> + Send + '_;

  fn get_version(
    &self,
    key: DocumentKey,
    version_number: i64,
  ) -> impl Future<Output = Result<Option<PolicyVersion>, Self::Error>> + Send + '_;

  /// Full history of a document, ordered by version number.
  fn list_versions(
    &self,
    key: DocumentKey,
  ) -> impl Future<Output = Result<Vec<PolicyVersion>, Self::Error>> + Send + '_;

  /// Every ACTIVE version across all documents — the change detector's
  /// snapshot input.
  fn list_active(
    &self,
  ) -> impl Future<Output = Result<Vec<PolicyVersion>, Self::Error>> + Send + '_;

  /// Append-only transition audit trail for a document, oldest first.
  fn audit_trail(
    &self,
    key: DocumentKey,
  ) -> impl Future<Output = Result<Vec<TransitionRecord>, Self::Error>> + Send + '_;
}
