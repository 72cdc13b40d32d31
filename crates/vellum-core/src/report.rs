//! The aggregate result of applying a sync plan.

use serde::{Deserialize, Serialize};

use crate::version::DocumentKey;

/// One document that could not be processed. The rest of the batch is
/// unaffected — a bad PDF never aborts a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDocument {
  pub document_key: DocumentKey,
  pub filename:     Option<String>,
  pub error:        String,
}

/// Counts of applied transitions plus per-document failure details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
  pub created:    usize,
  pub superseded: usize,
  pub retired:    usize,
  pub unchanged:  usize,
  pub failed:     Vec<FailedDocument>,
}

impl SyncReport {
  pub fn failed_count(&self) -> usize { self.failed.len() }

  /// True when every document in the plan was applied.
  pub fn is_clean(&self) -> bool { self.failed.is_empty() }
}
