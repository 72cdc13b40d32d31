//! End-to-end engine tests: real SQLite ledger and chunk index (in-memory),
//! real local file store over a temp directory, plus call-recording
//! extractors for the skip/failure properties.

use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use tempfile::TempDir;
use thiserror::Error;
use uuid::Uuid;
use vellum_core::{
  adapters::{ChunkIndex, DocumentFiles as _, Extraction, Extractor, Location},
  chunk::IndexedChunk,
  ledger::VersionLedger,
  status::VersionStatus,
  version::{
    DocumentKey, Ingest, NewVersion, PolicyVersion, Reversal,
    TransitionRecord,
  },
};
use vellum_store_sqlite::{SqliteChunkIndex, SqliteLedger};

use crate::{
  ExtractError, LocalDocumentFiles, PlainTextExtractor, RollbackManager,
  SyncOptions, SyncOrchestrator,
};

// ─── Test doubles ────────────────────────────────────────────────────────────

/// Delegates to the plain-text extractor, counting invocations.
#[derive(Clone)]
struct CountingExtractor {
  calls: Arc<AtomicUsize>,
}

impl Extractor for CountingExtractor {
  type Error = ExtractError;

  async fn extract(&self, bytes: Vec<u8>) -> Result<Extraction, ExtractError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    PlainTextExtractor.extract(bytes).await
  }
}

/// Sleeps past any reasonable timeout before extracting.
struct SlowExtractor(Duration);

impl Extractor for SlowExtractor {
  type Error = ExtractError;

  async fn extract(&self, bytes: Vec<u8>) -> Result<Extraction, ExtractError> {
    tokio::time::sleep(self.0).await;
    PlainTextExtractor.extract(bytes).await
  }
}

#[derive(Debug, Error)]
enum FlakyError {
  #[error("backend offline")]
  Offline,
  #[error(transparent)]
  Store(#[from] vellum_store_sqlite::Error),
}

/// Consume one unit of the failure budget; true while any remains.
fn take_failure(budget: &AtomicUsize) -> bool {
  budget
    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
    .is_ok()
}

/// Real SQLite index whose `set_status` fails while the budget lasts.
struct FlakyIndex {
  inner:         SqliteChunkIndex,
  failing_flips: Arc<AtomicUsize>,
}

impl ChunkIndex for FlakyIndex {
  type Error = FlakyError;

  async fn upsert(
    &self,
    version_id: Uuid,
    status: VersionStatus,
    chunks: Vec<IndexedChunk>,
  ) -> Result<(), FlakyError> {
    Ok(self.inner.upsert(version_id, status, chunks).await?)
  }

  async fn set_status(
    &self,
    version_id: Uuid,
    status: VersionStatus,
  ) -> Result<(), FlakyError> {
    if take_failure(&self.failing_flips) {
      return Err(FlakyError::Offline);
    }
    Ok(self.inner.set_status(version_id, status).await?)
  }

  async fn delete_by_version(&self, version_id: Uuid) -> Result<(), FlakyError> {
    Ok(self.inner.delete_by_version(version_id).await?)
  }
}

/// Real SQLite ledger whose `ingest` fails while the budget lasts.
struct FlakyLedger {
  inner:           SqliteLedger,
  failing_ingests: Arc<AtomicUsize>,
}

impl VersionLedger for FlakyLedger {
  type Error = FlakyError;

  async fn ingest(&self, new: NewVersion) -> Result<Ingest, FlakyError> {
    if take_failure(&self.failing_ingests) {
      return Err(FlakyError::Offline);
    }
    Ok(self.inner.ingest(new).await?)
  }

  async fn transition(
    &self,
    key: DocumentKey,
    version_number: i64,
    new_status: VersionStatus,
    reason: Option<String>,
  ) -> Result<PolicyVersion, FlakyError> {
    Ok(
      self
        .inner
        .transition(key, version_number, new_status, reason)
        .await?,
    )
  }

  async fn rollback(
    &self,
    key: DocumentKey,
    target_version: i64,
    reason: String,
  ) -> Result<Reversal, FlakyError> {
    Ok(self.inner.rollback(key, target_version, reason).await?)
  }

  async fn get_active(
    &self,
    key: DocumentKey,
  ) -> Result<Option<PolicyVersion>, FlakyError> {
    Ok(self.inner.get_active(key).await?)
  }

  async fn get_version(
    &self,
    key: DocumentKey,
    version_number: i64,
  ) -> Result<Option<PolicyVersion>, FlakyError> {
    Ok(self.inner.get_version(key, version_number).await?)
  }

  async fn list_versions(
    &self,
    key: DocumentKey,
  ) -> Result<Vec<PolicyVersion>, FlakyError> {
    Ok(self.inner.list_versions(key).await?)
  }

  async fn list_active(&self) -> Result<Vec<PolicyVersion>, FlakyError> {
    Ok(self.inner.list_active().await?)
  }

  async fn audit_trail(
    &self,
    key: DocumentKey,
  ) -> Result<Vec<TransitionRecord>, FlakyError> {
    Ok(self.inner.audit_trail(key).await?)
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

struct World {
  orchestrator: SyncOrchestrator<
    SqliteLedger,
    CountingExtractor,
    SqliteChunkIndex,
    LocalDocumentFiles,
  >,
  ledger:       SqliteLedger,
  index:        SqliteChunkIndex,
  files:        LocalDocumentFiles,
  calls:        Arc<AtomicUsize>,
  _tmp:         TempDir,
}

async fn world() -> World {
  let tmp = TempDir::new().expect("temp dir");
  let ledger = SqliteLedger::open_in_memory().await.expect("ledger");
  let index = SqliteChunkIndex::open_in_memory().await.expect("index");
  let files =
    LocalDocumentFiles::open(tmp.path()).await.expect("file store");
  let calls = Arc::new(AtomicUsize::new(0));

  let orchestrator = SyncOrchestrator::new(
    ledger.clone(),
    CountingExtractor { calls: calls.clone() },
    index.clone(),
    files.clone(),
    SyncOptions::default(),
  );

  World { orchestrator, ledger, index, files, calls, _tmp: tmp }
}

fn stage(w: &World, name: &str, contents: impl AsRef<[u8]>) {
  std::fs::write(w.files.path_of(Location::Staging, name), contents)
    .expect("stage file");
}

fn unstage(w: &World, name: &str) {
  std::fs::remove_file(w.files.path_of(Location::Staging, name))
    .expect("unstage file");
}

fn key(s: &str) -> DocumentKey { DocumentKey::new(s) }

const POLICY_V1: &str =
  "Visitor Policy\n\nReference: HR-014\n\n1. Scope\nAll wards.";
const POLICY_V2: &str =
  "Visitor Policy\n\nReference: HR-014\n\n1. Scope\nAll wards and clinics.";

// ─── Sync lifecycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn new_document_ingests_as_version_one() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);

  let report = w.orchestrator.sync().await.unwrap();
  assert_eq!(report.created, 1);
  assert!(report.is_clean());

  let active =
    w.ledger.get_active(key("visitor-policy")).await.unwrap().unwrap();
  assert_eq!(active.version_number, 1);
  assert_eq!(active.metadata.reference.as_deref(), Some("HR-014"));
  assert!(!active.chunk_ids.is_empty());

  assert_eq!(
    w.index.count_for_version(active.version_id).await.unwrap(),
    active.chunk_ids.len()
  );
  assert!(w.files.path_of(Location::Active, "visitor-policy.txt").exists());
}

#[tokio::test]
async fn second_sync_with_no_changes_is_a_noop() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);
  w.orchestrator.sync().await.unwrap();

  let report = w.orchestrator.sync().await.unwrap();
  assert_eq!(report.created, 0);
  assert_eq!(report.superseded, 0);
  assert_eq!(report.retired, 0);
  assert_eq!(report.unchanged, 1);

  let history = w.ledger.list_versions(key("visitor-policy")).await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn unchanged_documents_are_never_extracted() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);
  w.orchestrator.sync().await.unwrap();
  assert_eq!(w.calls.load(Ordering::SeqCst), 1);

  w.orchestrator.sync().await.unwrap();
  assert_eq!(w.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn changed_document_supersedes_without_deleting_chunks() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);
  w.orchestrator.sync().await.unwrap();

  stage(&w, "visitor-policy.txt", POLICY_V2);
  let report = w.orchestrator.sync().await.unwrap();
  assert_eq!(report.created, 1);
  assert_eq!(report.superseded, 1);

  let k = key("visitor-policy");
  let active = w.ledger.get_active(k.clone()).await.unwrap().unwrap();
  assert_eq!(active.version_number, 2);

  let v1 = w.ledger.get_version(k, 1).await.unwrap().unwrap();
  assert_eq!(v1.status, VersionStatus::Superseded);
  assert_eq!(v1.superseded_by, Some(2));

  // The old chunks are still present, just out of the default filter.
  assert_eq!(
    w.index.count_for_version(v1.version_id).await.unwrap(),
    v1.chunk_ids.len()
  );
  let superseded =
    w.index.query(VersionStatus::Superseded, None).await.unwrap();
  assert!(superseded.iter().all(|c| c.version_id == v1.version_id));
  assert!(!superseded.is_empty());

  // The displaced active file was archived, never overwritten.
  let archived = w.files.list(Location::Archive).await.unwrap();
  assert_eq!(archived.len(), 1);
}

#[tokio::test]
async fn removed_document_is_retired() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);
  w.orchestrator.sync().await.unwrap();

  unstage(&w, "visitor-policy.txt");
  let report = w.orchestrator.sync().await.unwrap();
  assert_eq!(report.retired, 1);
  assert_eq!(report.created, 0);

  let k = key("visitor-policy");
  assert!(w.ledger.get_active(k.clone()).await.unwrap().is_none());

  let v1 = w.ledger.get_version(k, 1).await.unwrap().unwrap();
  assert_eq!(v1.status, VersionStatus::Retired);

  // Chunks survive retirement with the retired status.
  assert_eq!(
    w.index.count_for_version(v1.version_id).await.unwrap(),
    v1.chunk_ids.len()
  );
  assert!(w.files.list(Location::Active).await.unwrap().is_empty());
  assert_eq!(w.files.list(Location::Archive).await.unwrap().len(), 1);
}

#[tokio::test]
async fn one_bad_document_does_not_abort_the_batch() {
  let w = world().await;
  stage(&w, "a-policy.txt", "Alpha\n\nBody A.");
  stage(&w, "b-policy.txt", [0xffu8, 0xfe, 0x00, 0x01]);
  stage(&w, "c-policy.txt", "Gamma\n\nBody C.");

  let report = w.orchestrator.sync().await.unwrap();
  assert_eq!(report.created, 2);
  assert_eq!(report.failed_count(), 1);
  assert_eq!(report.failed[0].filename.as_deref(), Some("b-policy.txt"));

  for doc in ["a-policy", "c-policy"] {
    let active = w.ledger.get_active(key(doc)).await.unwrap().unwrap();
    assert!(
      w.index.count_for_version(active.version_id).await.unwrap() > 0
    );
  }
  assert!(w.ledger.get_active(key("b-policy")).await.unwrap().is_none());
}

#[tokio::test]
async fn detect_has_no_side_effects() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);

  let plan = w.orchestrator.detect().await.unwrap();
  assert_eq!(plan.new.len(), 1);

  assert_eq!(w.calls.load(Ordering::SeqCst), 0);
  assert!(w.ledger.list_active().await.unwrap().is_empty());
  assert!(w.files.list(Location::Active).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_stops_before_any_document() {
  let w = world().await;
  stage(&w, "a-policy.txt", "Alpha\n\nBody A.");
  stage(&w, "b-policy.txt", "Beta\n\nBody B.");

  let plan = w.orchestrator.detect().await.unwrap();
  w.orchestrator.cancellation_token().cancel();

  let report = w.orchestrator.apply(plan).await;
  assert_eq!(report.created, 0);
  assert!(report.is_clean());
  assert!(w.ledger.list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_extraction_times_out_as_a_failure() {
  let tmp = TempDir::new().unwrap();
  let ledger = SqliteLedger::open_in_memory().await.unwrap();
  let index = SqliteChunkIndex::open_in_memory().await.unwrap();
  let files = LocalDocumentFiles::open(tmp.path()).await.unwrap();
  std::fs::write(
    files.path_of(Location::Staging, "slow.txt"),
    "Slow\n\nBody.",
  )
  .unwrap();

  let orchestrator = SyncOrchestrator::new(
    ledger.clone(),
    SlowExtractor(Duration::from_secs(5)),
    index,
    files,
    SyncOptions {
      concurrency: 2,
      timeout:     Duration::from_millis(50),
    },
  );

  let report = orchestrator.sync().await.unwrap();
  assert_eq!(report.failed_count(), 1);
  assert!(report.failed[0].error.contains("timed out"));
  assert!(ledger.get_active(key("slow")).await.unwrap().is_none());
}

#[tokio::test]
async fn index_flip_failure_is_repaired_by_the_next_sync() {
  let tmp = TempDir::new().unwrap();
  let ledger = SqliteLedger::open_in_memory().await.unwrap();
  let store_index = SqliteChunkIndex::open_in_memory().await.unwrap();
  let failing_flips = Arc::new(AtomicUsize::new(0));
  let files = LocalDocumentFiles::open(tmp.path()).await.unwrap();
  let orchestrator = SyncOrchestrator::new(
    ledger.clone(),
    PlainTextExtractor,
    FlakyIndex {
      inner:         store_index.clone(),
      failing_flips: failing_flips.clone(),
    },
    files.clone(),
    SyncOptions::default(),
  );

  std::fs::write(
    files.path_of(Location::Staging, "visitor-policy.txt"),
    POLICY_V1,
  )
  .unwrap();
  assert!(orchestrator.sync().await.unwrap().is_clean());

  // v2's ledger commit lands, then the flip of v1's chunks dies.
  std::fs::write(
    files.path_of(Location::Staging, "visitor-policy.txt"),
    POLICY_V2,
  )
  .unwrap();
  failing_flips.store(1, Ordering::SeqCst);
  let report = orchestrator.sync().await.unwrap();
  assert_eq!(report.failed_count(), 1);

  let k = key("visitor-policy");
  let v1 = ledger.get_version(k.clone(), 1).await.unwrap().unwrap();
  assert_eq!(v1.status, VersionStatus::Superseded);
  let stale = store_index.query(VersionStatus::Active, None).await.unwrap();
  assert!(stale.iter().any(|c| c.version_id == v1.version_id));

  // The next run classifies the document unchanged and re-asserts the
  // index statuses from the ledger.
  let report = orchestrator.sync().await.unwrap();
  assert!(report.is_clean());
  assert_eq!(report.unchanged, 1);

  let v2 = ledger.get_active(k).await.unwrap().unwrap();
  let active = store_index.query(VersionStatus::Active, None).await.unwrap();
  assert!(!active.is_empty());
  assert!(active.iter().all(|c| c.version_id == v2.version_id));
  // v1's chunks are hidden, not deleted.
  assert_eq!(
    store_index.count_for_version(v1.version_id).await.unwrap(),
    v1.chunk_ids.len()
  );
}

#[tokio::test]
async fn failed_ledger_write_drops_the_orphaned_chunks() {
  let tmp = TempDir::new().unwrap();
  let store_ledger = SqliteLedger::open_in_memory().await.unwrap();
  let index = SqliteChunkIndex::open_in_memory().await.unwrap();
  let failing_ingests = Arc::new(AtomicUsize::new(1));
  let files = LocalDocumentFiles::open(tmp.path()).await.unwrap();
  let orchestrator = SyncOrchestrator::new(
    FlakyLedger {
      inner:           store_ledger.clone(),
      failing_ingests: failing_ingests.clone(),
    },
    PlainTextExtractor,
    index.clone(),
    files.clone(),
    SyncOptions::default(),
  );

  std::fs::write(
    files.path_of(Location::Staging, "visitor-policy.txt"),
    POLICY_V1,
  )
  .unwrap();
  let report = orchestrator.sync().await.unwrap();
  assert_eq!(report.failed_count(), 1);

  // The chunks written ahead of the failed ledger insert were dropped;
  // nothing in the index pretends to be active.
  assert!(index.query(VersionStatus::Active, None).await.unwrap().is_empty());

  let report = orchestrator.sync().await.unwrap();
  assert!(report.is_clean());
  assert_eq!(report.created, 1);
  let active =
    store_ledger.get_active(key("visitor-policy")).await.unwrap().unwrap();
  assert_eq!(
    index.count_for_version(active.version_id).await.unwrap(),
    active.chunk_ids.len()
  );
}

// ─── Rollback & retire ───────────────────────────────────────────────────────

#[tokio::test]
async fn rollback_makes_old_chunks_searchable_again() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);
  w.orchestrator.sync().await.unwrap();
  stage(&w, "visitor-policy.txt", POLICY_V2);
  w.orchestrator.sync().await.unwrap();

  let manager = RollbackManager::new(
    w.ledger.clone(),
    w.index.clone(),
    w.files.clone(),
  );

  let k = key("visitor-policy");
  let reversal = manager
    .rollback(k.clone(), 1, "revision 2 published in error")
    .await
    .unwrap();
  assert_eq!(reversal.promoted.version_number, 1);
  assert_eq!(reversal.demoted.version_number, 2);

  let active = w.ledger.get_active(k.clone()).await.unwrap().unwrap();
  assert_eq!(active.version_number, 1);

  let visible = w.index.query(VersionStatus::Active, None).await.unwrap();
  assert!(visible.iter().all(|c| c.version_id == active.version_id));
  assert!(visible.iter().any(|c| c.text.contains("All wards.")));
}

#[tokio::test]
async fn rollback_round_trip_creates_no_chunks() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);
  w.orchestrator.sync().await.unwrap();
  stage(&w, "visitor-policy.txt", POLICY_V2);
  w.orchestrator.sync().await.unwrap();

  let k = key("visitor-policy");
  let before = w.ledger.get_active(k.clone()).await.unwrap().unwrap();
  let active_before =
    w.index.query(VersionStatus::Active, None).await.unwrap().len();

  let manager = RollbackManager::new(
    w.ledger.clone(),
    w.index.clone(),
    w.files.clone(),
  );
  manager.rollback(k.clone(), 1, "revert").await.unwrap();
  manager.rollback(k.clone(), 2, "re-apply").await.unwrap();

  let after = w.ledger.get_active(k.clone()).await.unwrap().unwrap();
  assert_eq!(after.version_id, before.version_id);
  assert_eq!(after.chunk_ids, before.chunk_ids);
  assert_eq!(
    w.index.query(VersionStatus::Active, None).await.unwrap().len(),
    active_before
  );
  assert_eq!(w.ledger.list_versions(k).await.unwrap().len(), 2);
}

#[tokio::test]
async fn manager_retires_the_active_version() {
  let w = world().await;
  stage(&w, "visitor-policy.txt", POLICY_V1);
  w.orchestrator.sync().await.unwrap();

  let manager = RollbackManager::new(
    w.ledger.clone(),
    w.index.clone(),
    w.files.clone(),
  );
  let k = key("visitor-policy");
  let retired = manager
    .retire(k.clone(), Some("policy withdrawn".into()))
    .await
    .unwrap();
  assert_eq!(retired.status, VersionStatus::Retired);

  assert!(w.ledger.get_active(k.clone()).await.unwrap().is_none());
  assert!(w.index.query(VersionStatus::Active, None).await.unwrap().is_empty());
  assert_eq!(w.files.list(Location::Archive).await.unwrap().len(), 1);
}

#[tokio::test]
async fn retire_without_active_version_fails() {
  let w = world().await;
  let manager = RollbackManager::new(
    w.ledger.clone(),
    w.index.clone(),
    w.files.clone(),
  );
  let err =
    manager.retire(key("ghost"), None).await.unwrap_err();
  assert!(err.to_string().contains("no active version"));
}
