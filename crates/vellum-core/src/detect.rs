//! Change detection — the pure diff between a staging listing and the
//! ledger's ACTIVE snapshot.
//!
//! Producing a [`SyncPlan`] has no side effects, so the CLI's `detect`
//! dry-run and the real `sync` run share this code path exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::version::{DocumentKey, PolicyVersion};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// One file enumerated from the staging location, already hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
  pub filename:     String,
  /// Lowercase hex SHA-256 of the file's bytes.
  pub content_hash: String,
}

impl StagedFile {
  pub fn new(
    filename: impl Into<String>,
    content_hash: impl Into<String>,
  ) -> Self {
    Self { filename: filename.into(), content_hash: content_hash.into() }
  }
}

// ─── Plan entries ────────────────────────────────────────────────────────────

/// A staged document with no version on record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
  pub filename:     String,
  pub document_key: DocumentKey,
  pub content_hash: String,
}

/// A staged document whose bytes differ from its ACTIVE version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedEntry {
  pub filename:        String,
  pub document_key:    DocumentKey,
  pub content_hash:    String,
  /// The ACTIVE version this ingest will supersede.
  pub active_version:  i64,
}

/// A document with an ACTIVE version but no staged file — withdrawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedEntry {
  pub document_key:   DocumentKey,
  pub active_version: i64,
}

/// The classified diff. A pure value — applying it is a separate step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPlan {
  pub new:       Vec<NewEntry>,
  pub changed:   Vec<ChangedEntry>,
  /// Keys whose staged bytes match their ACTIVE version; never
  /// re-extracted or re-ingested.
  pub unchanged: Vec<DocumentKey>,
  pub deleted:   Vec<DeletedEntry>,
}

impl SyncPlan {
  pub fn unchanged_count(&self) -> usize { self.unchanged.len() }

  /// True when applying the plan would write nothing.
  pub fn is_noop(&self) -> bool {
    self.new.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Classify every staged file against the ACTIVE snapshot.
///
/// Files are processed in lexicographic filename order, so when two staged
/// files map to the same document key the first wins and the second is
/// reported UNCHANGED — the tie-break is deterministic. Keys with only a
/// DRAFT version on record are absent from the ACTIVE snapshot and classify
/// as NEW.
pub fn plan_sync(
  staged: &[StagedFile],
  active: &[PolicyVersion],
) -> SyncPlan {
  let active_by_key: BTreeMap<&DocumentKey, &PolicyVersion> =
    active.iter().map(|v| (&v.document_key, v)).collect();

  let mut ordered: Vec<&StagedFile> = staged.iter().collect();
  ordered.sort_by(|a, b| a.filename.cmp(&b.filename));

  let mut plan = SyncPlan::default();
  let mut seen: BTreeMap<DocumentKey, ()> = BTreeMap::new();

  for file in ordered {
    let key = DocumentKey::from_filename(&file.filename);

    if seen.contains_key(&key) {
      // A second staged file for an already-classified key.
      plan.unchanged.push(key);
      continue;
    }
    seen.insert(key.clone(), ());

    match active_by_key.get(&key) {
      None => plan.new.push(NewEntry {
        filename:     file.filename.clone(),
        document_key: key,
        content_hash: file.content_hash.clone(),
      }),
      Some(current) if current.content_hash == file.content_hash => {
        plan.unchanged.push(key);
      }
      Some(current) => plan.changed.push(ChangedEntry {
        filename:       file.filename.clone(),
        document_key:   key,
        content_hash:   file.content_hash.clone(),
        active_version: current.version_number,
      }),
    }
  }

  for (key, version) in active_by_key {
    if !seen.contains_key(key) {
      plan.deleted.push(DeletedEntry {
        document_key:   key.clone(),
        active_version: version.version_number,
      });
    }
  }

  plan
}
