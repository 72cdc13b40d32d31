//! The rollback manager: revert a document to a superseded (or retired)
//! version, or retire it out-of-band.
//!
//! Rollback never touches chunk contents — the target version's chunks were
//! never deleted, so flipping its status back to ACTIVE is enough for the
//! default search filter to pick them up again. The paired ledger
//! transition is atomic; the index flips after it are idempotent and safe
//! to retry.

use tracing::info;
use vellum_core::{
  adapters::{ChunkIndex, DocumentFiles, Location},
  ledger::VersionLedger,
  status::VersionStatus,
  version::{DocumentKey, PolicyVersion, Reversal},
};

use crate::SyncError;

pub struct RollbackManager<L, C, F> {
  ledger: L,
  index:  C,
  files:  F,
}

impl<L, C, F> RollbackManager<L, C, F>
where
  L: VersionLedger,
  C: ChunkIndex,
  F: DocumentFiles,
{
  pub fn new(ledger: L, index: C, files: F) -> Self {
    Self { ledger, index, files }
  }

  /// Revert `key` to `target_version`. The target must be SUPERSEDED or
  /// RETIRED and the document must currently have an ACTIVE version; the
  /// ledger enforces both and performs the swap atomically. The reason is
  /// mandatory and lands in the audit log.
  pub async fn rollback(
    &self,
    key: DocumentKey,
    target_version: i64,
    reason: &str,
  ) -> Result<Reversal, SyncError> {
    let reversal = self
      .ledger
      .rollback(key.clone(), target_version, reason.to_owned())
      .await
      .map_err(SyncError::ledger)?;

    self
      .index
      .set_status(reversal.demoted.version_id, VersionStatus::Superseded)
      .await
      .map_err(SyncError::index)?;
    self
      .index
      .set_status(reversal.promoted.version_id, VersionStatus::Active)
      .await
      .map_err(SyncError::index)?;

    info!(
      key = %key,
      demoted = reversal.demoted.version_number,
      promoted = reversal.promoted.version_number,
      reason = %reason,
      "rolled back"
    );
    Ok(reversal)
  }

  /// Retire the document's ACTIVE version: withdraw it with no replacement.
  pub async fn retire(
    &self,
    key: DocumentKey,
    reason: Option<String>,
  ) -> Result<PolicyVersion, SyncError> {
    let active = self
      .ledger
      .get_active(key.clone())
      .await
      .map_err(SyncError::ledger)?
      .ok_or_else(|| {
        SyncError::ledger(vellum_core::Error::NoActiveVersion(key.clone()))
      })?;

    let retired = self
      .ledger
      .transition(
        key.clone(),
        active.version_number,
        VersionStatus::Retired,
        reason.clone(),
      )
      .await
      .map_err(SyncError::ledger)?;

    self
      .index
      .set_status(retired.version_id, VersionStatus::Retired)
      .await
      .map_err(SyncError::index)?;

    // Best-effort: the ledger is the source of truth for status, the file
    // layout is derived from it.
    if let Err(e) = self
      .files
      .move_document(
        retired.source_file.clone(),
        Location::Active,
        Location::Archive,
      )
      .await
    {
      tracing::warn!(
        key = %key, file = %retired.source_file, error = %e,
        "could not archive retired file"
      );
    }

    info!(
      key = %key,
      version_number = retired.version_number,
      reason = reason.as_deref().unwrap_or("(none)"),
      "retired"
    );
    Ok(retired)
  }
}
