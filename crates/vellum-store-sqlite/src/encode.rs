//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are ISO 8601, UUIDs are
//! hyphenated lowercase, metadata is compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use vellum_core::{
  status::VersionStatus,
  version::{DocumentKey, DocumentMetadata, PolicyVersion, TransitionRecord},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_status(s: &str) -> Result<VersionStatus> {
  VersionStatus::parse(s).ok_or_else(|| Error::UnknownStatus(s.to_owned()))
}

pub fn encode_metadata(m: &DocumentMetadata) -> Result<String> {
  Ok(serde_json::to_string(m)?)
}

pub fn decode_metadata(s: &str) -> Result<DocumentMetadata> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `policy_versions` row.
pub struct RawVersion {
  pub version_id:      String,
  pub document_key:    String,
  pub version_number:  i64,
  pub content_hash:    String,
  pub status:          String,
  pub version_date:    String,
  pub effective_date:  Option<String>,
  pub expiration_date: Option<String>,
  pub superseded_by:   Option<i64>,
  pub source_file:     String,
  pub metadata_json:   String,
}

impl RawVersion {
  /// Columns in the order every `SELECT` over `policy_versions` uses.
  pub const COLUMNS: &'static str = "version_id, document_key, \
     version_number, content_hash, status, version_date, effective_date, \
     expiration_date, superseded_by, source_file, metadata_json";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:      row.get(0)?,
      document_key:    row.get(1)?,
      version_number:  row.get(2)?,
      content_hash:    row.get(3)?,
      status:          row.get(4)?,
      version_date:    row.get(5)?,
      effective_date:  row.get(6)?,
      expiration_date: row.get(7)?,
      superseded_by:   row.get(8)?,
      source_file:     row.get(9)?,
      metadata_json:   row.get(10)?,
    })
  }

  pub fn into_version(self, chunk_ids: Vec<String>) -> Result<PolicyVersion> {
    Ok(PolicyVersion {
      version_id:      decode_uuid(&self.version_id)?,
      document_key:    DocumentKey::new(self.document_key),
      version_number:  self.version_number,
      content_hash:    self.content_hash,
      status:          decode_status(&self.status)?,
      version_date:    decode_dt(&self.version_date)?,
      effective_date:  self
        .effective_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      expiration_date: self
        .expiration_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      superseded_by:   self.superseded_by,
      chunk_ids:       chunk_ids
        .iter()
        .map(|s| decode_uuid(s))
        .collect::<Result<_>>()?,
      source_file:     self.source_file,
      metadata:        decode_metadata(&self.metadata_json)?,
    })
  }
}

/// Raw strings read directly from a `transitions` row.
pub struct RawTransition {
  pub document_key:   String,
  pub version_number: i64,
  pub from_status:    Option<String>,
  pub to_status:      String,
  pub reason:         Option<String>,
  pub recorded_at:    String,
}

impl RawTransition {
  pub fn into_record(self) -> Result<TransitionRecord> {
    Ok(TransitionRecord {
      document_key:   DocumentKey::new(self.document_key),
      version_number: self.version_number,
      from:           self
        .from_status
        .as_deref()
        .map(decode_status)
        .transpose()?,
      to:             decode_status(&self.to_status)?,
      reason:         self.reason,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}
