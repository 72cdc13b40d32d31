//! The sync orchestrator: detect (pure classification) and apply (drive the
//! ledger, index and file store through the matching transitions).
//!
//! Documents are independent, so apply fans out over a bounded worker pool.
//! Within one document, the extract → index upsert → ledger ingest → file
//! publish sequence is the atomic unit: failures isolate to that document
//! and a retry of the same plan converges (duplicate-hash ingest is a
//! no-op). Cancellation is honoured between documents, never mid-document.

use std::time::Duration;

use futures::{StreamExt as _, stream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use vellum_core::{
  adapters::{ChunkIndex, DocumentFiles, Extractor, Location},
  chunk::IndexedChunk,
  detect::{SyncPlan, plan_sync, StagedFile},
  ledger::VersionLedger,
  report::{FailedDocument, SyncReport},
  status::VersionStatus,
  version::{DocumentKey, Ingest, NewVersion},
};

use crate::{SyncError, hash::fingerprint_bytes};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyncOptions {
  /// How many documents are processed concurrently.
  pub concurrency: usize,
  /// Budget for each extraction or index call; a timed-out document is
  /// recorded as failed, not retried.
  pub timeout:     Duration,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self { concurrency: 4, timeout: Duration::from_secs(30) }
  }
}

// ─── Work items ──────────────────────────────────────────────────────────────

enum Job {
  Ingest { filename: String, key: DocumentKey, content_hash: String },
  Retire { key: DocumentKey, version_number: i64 },
  /// Unchanged documents still get their index statuses re-asserted from
  /// the ledger, so a run after a partial failure converges.
  Reconcile { key: DocumentKey },
}

enum Applied {
  Created { superseded: bool },
  Unchanged,
  Retired,
  Failed(FailedDocument),
  Cancelled,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct SyncOrchestrator<L, E, C, F> {
  ledger:    L,
  extractor: E,
  index:     C,
  files:     F,
  options:   SyncOptions,
  cancel:    CancellationToken,
}

impl<L, E, C, F> SyncOrchestrator<L, E, C, F>
where
  L: VersionLedger,
  E: Extractor,
  C: ChunkIndex,
  F: DocumentFiles,
{
  pub fn new(
    ledger: L,
    extractor: E,
    index: C,
    files: F,
    options: SyncOptions,
  ) -> Self {
    Self {
      ledger,
      extractor,
      index,
      files,
      options,
      cancel: CancellationToken::new(),
    }
  }

  /// Token for cooperative cancellation; checked between documents.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  // ── Detect ────────────────────────────────────────────────────────────

  /// Enumerate and hash the staging location, then classify against the
  /// ledger's ACTIVE snapshot. Pure with respect to ledger and index — this
  /// is the dry-run path, and `sync` runs exactly this code before apply.
  pub async fn detect(&self) -> Result<SyncPlan, SyncError> {
    let filenames = self
      .files
      .list(Location::Staging)
      .await
      .map_err(SyncError::files)?;

    let staged: Vec<StagedFile> = stream::iter(filenames)
      .map(|filename| async move {
        let bytes = self
          .files
          .read(Location::Staging, filename.clone())
          .await
          .map_err(SyncError::files)?;
        Ok::<_, SyncError>(StagedFile::new(filename, fingerprint_bytes(&bytes)))
      })
      .buffer_unordered(self.options.concurrency)
      .collect::<Vec<_>>()
      .await
      .into_iter()
      .collect::<Result<_, _>>()?;

    let active = self.ledger.list_active().await.map_err(SyncError::ledger)?;
    Ok(plan_sync(&staged, &active))
  }

  /// Detect, then apply.
  pub async fn sync(&self) -> Result<SyncReport, SyncError> {
    let plan = self.detect().await?;
    Ok(self.apply(plan).await)
  }

  // ── Apply ─────────────────────────────────────────────────────────────

  /// Apply a classified plan. Never fails as a whole: per-document errors
  /// land in the report and the batch continues.
  pub async fn apply(&self, plan: SyncPlan) -> SyncReport {
    let mut report = SyncReport::default();

    let jobs: Vec<Job> = plan
      .new
      .into_iter()
      .map(|e| Job::Ingest {
        filename:     e.filename,
        key:          e.document_key,
        content_hash: e.content_hash,
      })
      .chain(plan.changed.into_iter().map(|e| Job::Ingest {
        filename:     e.filename,
        key:          e.document_key,
        content_hash: e.content_hash,
      }))
      .chain(plan.deleted.into_iter().map(|e| Job::Retire {
        key:            e.document_key,
        version_number: e.active_version,
      }))
      .chain(plan.unchanged.into_iter().map(|key| Job::Reconcile { key }))
      .collect();

    let outcomes: Vec<Applied> = stream::iter(jobs)
      .map(|job| self.run_job(job))
      .buffer_unordered(self.options.concurrency)
      .collect()
      .await;

    let mut cancelled = 0usize;
    for outcome in outcomes {
      match outcome {
        Applied::Created { superseded } => {
          report.created += 1;
          if superseded {
            report.superseded += 1;
          }
        }
        Applied::Unchanged => report.unchanged += 1,
        Applied::Retired => report.retired += 1,
        Applied::Failed(failure) => report.failed.push(failure),
        Applied::Cancelled => cancelled += 1,
      }
    }

    if cancelled > 0 {
      warn!(cancelled, "sync cancelled before all documents were applied");
    }
    info!(
      created = report.created,
      superseded = report.superseded,
      retired = report.retired,
      unchanged = report.unchanged,
      failed = report.failed_count(),
      "sync plan applied"
    );
    report
  }

  async fn run_job(&self, job: Job) -> Applied {
    if self.cancel.is_cancelled() {
      return Applied::Cancelled;
    }

    match job {
      Job::Ingest { filename, key, content_hash } => {
        match self.ingest_document(&filename, &key, content_hash).await {
          Ok(applied) => applied,
          Err(e) => {
            warn!(key = %key, file = %filename, error = %e, "document failed");
            Applied::Failed(FailedDocument {
              document_key: key,
              filename:     Some(filename),
              error:        e.to_string(),
            })
          }
        }
      }
      Job::Retire { key, version_number } => {
        match self.retire_document(&key, version_number).await {
          Ok(()) => Applied::Retired,
          Err(e) => {
            warn!(key = %key, error = %e, "retire failed");
            Applied::Failed(FailedDocument {
              document_key: key,
              filename:     None,
              error:        e.to_string(),
            })
          }
        }
      }
      Job::Reconcile { key } => {
        match self.reconcile_document(&key).await {
          Ok(()) => Applied::Unchanged,
          Err(e) => {
            warn!(key = %key, error = %e, "reconcile failed");
            Applied::Failed(FailedDocument {
              document_key: key,
              filename:     None,
              error:        e.to_string(),
            })
          }
        }
      }
    }
  }

  // ── Per-document units ────────────────────────────────────────────────

  async fn ingest_document(
    &self,
    filename: &str,
    key: &DocumentKey,
    content_hash: String,
  ) -> Result<Applied, SyncError> {
    let bytes = self
      .files
      .read(Location::Staging, filename.to_owned())
      .await
      .map_err(SyncError::files)?;

    let extraction = self
      .bounded("extraction", self.extractor.extract(bytes))
      .await?
      .map_err(SyncError::extraction)?;

    let version_id = Uuid::new_v4();
    let chunks = IndexedChunk::mint(extraction.chunks);
    let chunk_ids = chunks.iter().map(|c| c.chunk_id).collect();

    // Chunks first, tagged with the pre-minted version id; a failed ledger
    // write drops them again below. A retry mints fresh ids, so they would
    // otherwise linger in the default status filter forever.
    self
      .bounded(
        "index upsert",
        self.index.upsert(version_id, VersionStatus::Active, chunks),
      )
      .await?
      .map_err(SyncError::index)?;

    let outcome = match self
      .ledger
      .ingest(NewVersion::active(
        key.clone(),
        version_id,
        content_hash,
        chunk_ids,
        filename,
        extraction.metadata,
      ))
      .await
    {
      Ok(outcome) => outcome,
      Err(e) => {
        if let Err(cleanup) = self.index.delete_by_version(version_id).await
        {
          warn!(
            key = %key, error = %cleanup,
            "could not drop chunks after failed ingest"
          );
        }
        return Err(SyncError::ledger(e));
      }
    };

    match outcome {
      Ingest::Unchanged { version_number } => {
        // A concurrent or repeated run already recorded these bytes; drop
        // the chunks written above, then reconcile in case the earlier run
        // died between its ledger commit and its index flips.
        self
          .index
          .delete_by_version(version_id)
          .await
          .map_err(SyncError::index)?;
        self.reconcile_document(key).await?;
        info!(key = %key, version_number, "already recorded, skipped");
        Ok(Applied::Unchanged)
      }
      Ingest::Created { version, superseded } => {
        if let Some(displaced) = &superseded {
          self
            .bounded(
              "index status flip",
              self
                .index
                .set_status(displaced.version_id, VersionStatus::Superseded),
            )
            .await?
            .map_err(SyncError::index)?;

          // The ledger row is committed; a stale file must not fail the
          // document, the ledger is the source of truth.
          if let Err(e) = self
            .files
            .move_document(
              displaced.source_file.clone(),
              Location::Active,
              Location::Archive,
            )
            .await
          {
            warn!(
              key = %key, file = %displaced.source_file, error = %e,
              "could not archive displaced file"
            );
          }
        }

        if let Err(e) = self
          .files
          .copy_document(
            filename.to_owned(),
            Location::Staging,
            Location::Active,
          )
          .await
        {
          warn!(key = %key, file = %filename, error = %e, "could not publish file");
        }

        info!(
          key = %key,
          version_number = version.version_number,
          superseded = superseded.as_ref().map(|d| d.version_number),
          file = %filename,
          "document ingested"
        );
        Ok(Applied::Created { superseded: superseded.is_some() })
      }
    }
  }

  /// Re-assert the index status of every version of a document from the
  /// ledger. Idempotent updates; for an unchanged document this is the only
  /// work done per run, and it is what repairs the index when an earlier
  /// run committed a ledger write but died before its status flips.
  async fn reconcile_document(
    &self,
    key: &DocumentKey,
  ) -> Result<(), SyncError> {
    let versions = self
      .ledger
      .list_versions(key.clone())
      .await
      .map_err(SyncError::ledger)?;
    for version in versions {
      self
        .bounded(
          "index status flip",
          self.index.set_status(version.version_id, version.status),
        )
        .await?
        .map_err(SyncError::index)?;
    }
    Ok(())
  }

  async fn retire_document(
    &self,
    key: &DocumentKey,
    version_number: i64,
  ) -> Result<(), SyncError> {
    let retired = self
      .ledger
      .transition(
        key.clone(),
        version_number,
        VersionStatus::Retired,
        Some("removed from staging".to_owned()),
      )
      .await
      .map_err(SyncError::ledger)?;

    self
      .bounded(
        "index status flip",
        self.index.set_status(retired.version_id, VersionStatus::Retired),
      )
      .await?
      .map_err(SyncError::index)?;

    if let Err(e) = self
      .files
      .move_document(
        retired.source_file.clone(),
        Location::Active,
        Location::Archive,
      )
      .await
    {
      warn!(
        key = %key, file = %retired.source_file, error = %e,
        "could not archive retired file"
      );
    }

    info!(key = %key, version_number, "document retired");
    Ok(())
  }

  /// Run a collaborator call under the configured timeout.
  async fn bounded<T>(
    &self,
    stage: &'static str,
    fut: impl Future<Output = T>,
  ) -> Result<T, SyncError> {
    tokio::time::timeout(self.options.timeout, fut)
      .await
      .map_err(|_| SyncError::Timeout {
        stage,
        seconds: self.options.timeout.as_secs(),
      })
  }
}
