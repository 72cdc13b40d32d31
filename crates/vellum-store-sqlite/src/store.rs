//! [`SqliteLedger`] — the SQLite implementation of
//! [`VersionLedger`](vellum_core::ledger::VersionLedger).

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use vellum_core::{
  ledger::VersionLedger,
  status::VersionStatus,
  version::{
    Displaced, DocumentKey, Ingest, NewVersion, PolicyVersion, Reversal,
    TransitionRecord, VersionRef,
  },
};

use crate::{
  Error, Result,
  encode::{RawTransition, RawVersion, encode_date, encode_dt, encode_metadata, encode_uuid},
  schema::SCHEMA,
};

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// A version ledger backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All paired
/// transitions run in explicit transactions on the one writer connection,
/// which serializes them per document key.
#[derive(Clone)]
pub struct SqliteLedger {
  conn: tokio_rusqlite::Connection,
}

impl SqliteLedger {
  /// Open (or create) a ledger at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let ledger = Self { conn };
    ledger.init_schema().await?;
    Ok(ledger)
  }

  /// Open an in-memory ledger — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let ledger = Self { conn };
    ledger.init_schema().await?;
    Ok(ledger)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_version(
    &self,
    key: DocumentKey,
    version_number: Option<i64>,
  ) -> Result<Option<PolicyVersion>> {
    let key_str = key.as_str().to_owned();

    let raw: Option<(RawVersion, Vec<String>)> = self
      .conn
      .call(move |conn| {
        let raw = match version_number {
          Some(n) => load_version(conn, &key_str, n)?,
          None => load_active(conn, &key_str)?,
        };
        match raw {
          Some(raw) => {
            let chunks = load_chunk_ids(conn, &raw.version_id)?;
            Ok(Some((raw, chunks)))
          }
          None => Ok(None),
        }
      })
      .await?;

    raw.map(|(raw, chunks)| raw.into_version(chunks)).transpose()
  }
}

// ─── Raw write outcomes ──────────────────────────────────────────────────────
// Domain decisions made inside a `conn.call` closure come back as plain
// enums; mapping to the error taxonomy happens on the async side.

enum RawIngest {
  Unchanged(i64),
  Created {
    version_number: i64,
    superseded:     Option<(i64, String, String)>,
  },
}

enum RawTransitionOutcome {
  NotFound,
  Illegal { from: String },
  WouldDuplicateActive,
  Done(RawVersion, Vec<String>),
}

enum RawRollback {
  TargetNotFound,
  TargetNotRollbackable { status: String },
  NoActive,
  Done { demoted: (i64, String), promoted: (i64, String) },
}

// ─── VersionLedger impl ──────────────────────────────────────────────────────

impl VersionLedger for SqliteLedger {
  type Error = Error;

  async fn ingest(&self, new: NewVersion) -> Result<Ingest> {
    if !matches!(
      new.initial_status,
      VersionStatus::Draft | VersionStatus::Active
    ) {
      return Err(Error::BadInitialStatus(new.initial_status));
    }

    let now = Utc::now();
    let key_str = new.document_key.as_str().to_owned();
    let version_id_str = encode_uuid(new.version_id);
    let content_hash = new.content_hash.clone();
    let status_str = new.initial_status.as_str().to_owned();
    let now_str = encode_dt(now);
    let effective_str = new.effective_date.map(encode_date);
    let source_file = new.source_file.clone();
    let metadata_str = encode_metadata(&new.metadata)?;
    let chunk_id_strs: Vec<String> =
      new.chunk_ids.iter().copied().map(encode_uuid).collect();
    let promote_to_active = new.initial_status.is_active();

    let raw: RawIngest = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Idempotent no-op: a non-retired version of this document already
        // carries these bytes.
        let existing: Option<i64> = tx
          .query_row(
            "SELECT version_number FROM policy_versions
             WHERE document_key = ?1 AND content_hash = ?2
               AND status != 'retired'
             ORDER BY version_number DESC LIMIT 1",
            rusqlite::params![key_str, content_hash],
            |r| r.get(0),
          )
          .optional()?;
        if let Some(n) = existing {
          return Ok(RawIngest::Unchanged(n));
        }

        let next: i64 = tx.query_row(
          "SELECT COALESCE(MAX(version_number), 0) + 1
           FROM policy_versions WHERE document_key = ?1",
          rusqlite::params![key_str],
          |r| r.get(0),
        )?;

        // Supersede the outgoing ACTIVE version in the same transaction so
        // the partial unique index never sees two ACTIVE rows.
        let mut superseded = None;
        if promote_to_active {
          let prior: Option<(i64, String, String)> = tx
            .query_row(
              "SELECT version_number, version_id, source_file
               FROM policy_versions
               WHERE document_key = ?1 AND status = 'active'",
              rusqlite::params![key_str],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
          if let Some((prior_n, prior_vid, prior_src)) = prior {
            tx.execute(
              "UPDATE policy_versions
               SET status = 'superseded', superseded_by = ?1
               WHERE document_key = ?2 AND version_number = ?3",
              rusqlite::params![next, key_str, prior_n],
            )?;
            insert_transition(
              &tx,
              &key_str,
              prior_n,
              Some("active"),
              "superseded",
              Some(&format!("superseded by version {next}")),
              &now_str,
            )?;
            superseded = Some((prior_n, prior_vid, prior_src));
          }
        }

        tx.execute(
          "INSERT INTO policy_versions (
             version_id, document_key, version_number, content_hash,
             status, version_date, effective_date, expiration_date,
             superseded_by, source_file, metadata_json
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8, ?9)",
          rusqlite::params![
            version_id_str,
            key_str,
            next,
            content_hash,
            status_str,
            now_str,
            effective_str,
            source_file,
            metadata_str,
          ],
        )?;

        for (position, chunk_id) in chunk_id_strs.iter().enumerate() {
          tx.execute(
            "INSERT INTO version_chunks (chunk_id, version_id, position)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![chunk_id, version_id_str, position as i64],
          )?;
        }

        insert_transition(
          &tx, &key_str, next, None, &status_str, None, &now_str,
        )?;

        tx.commit()?;
        Ok(RawIngest::Created { version_number: next, superseded })
      })
      .await?;

    match raw {
      RawIngest::Unchanged(version_number) => {
        tracing::debug!(
          key = %new.document_key, version_number,
          "ingest skipped: content hash already recorded"
        );
        Ok(Ingest::Unchanged { version_number })
      }
      RawIngest::Created { version_number, superseded } => {
        let superseded = superseded
          .map(|(n, vid, src)| {
            Ok::<_, Error>(Displaced {
              version_number: n,
              version_id:     crate::encode::decode_uuid(&vid)?,
              source_file:    src,
            })
          })
          .transpose()?;

        tracing::debug!(
          key = %new.document_key, version_number,
          superseded = superseded.as_ref().map(|d| d.version_number),
          "version recorded"
        );

        Ok(Ingest::Created {
          version: PolicyVersion {
            version_id: new.version_id,
            document_key: new.document_key,
            version_number,
            content_hash: new.content_hash,
            status: new.initial_status,
            version_date: now,
            effective_date: new.effective_date,
            expiration_date: None,
            superseded_by: None,
            chunk_ids: new.chunk_ids,
            source_file: new.source_file,
            metadata: new.metadata,
          },
          superseded,
        })
      }
    }
  }

  async fn transition(
    &self,
    key: DocumentKey,
    version_number: i64,
    new_status: VersionStatus,
    reason: Option<String>,
  ) -> Result<PolicyVersion> {
    let key_str = key.as_str().to_owned();
    let to_str = new_status.as_str().to_owned();
    let now_str = encode_dt(Utc::now());

    let raw: RawTransitionOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(row) = load_version(&tx, &key_str, version_number)? else {
          return Ok(RawTransitionOutcome::NotFound);
        };

        let from = match VersionStatus::parse(&row.status) {
          Some(s) => s,
          None => {
            return Ok(RawTransitionOutcome::Illegal { from: row.status });
          }
        };
        let to = new_status;
        if !from.can_transition_to(to) {
          return Ok(RawTransitionOutcome::Illegal { from: row.status });
        }

        // A bare promotion to ACTIVE is only legal when nothing else is
        // active for this document; the paired swap goes through rollback.
        if to.is_active() {
          let other_active: Option<i64> = tx
            .query_row(
              "SELECT version_number FROM policy_versions
               WHERE document_key = ?1 AND status = 'active'
                 AND version_number != ?2",
              rusqlite::params![key_str, version_number],
              |r| r.get(0),
            )
            .optional()?;
          if other_active.is_some() {
            return Ok(RawTransitionOutcome::WouldDuplicateActive);
          }
          tx.execute(
            "UPDATE policy_versions
             SET status = ?1, superseded_by = NULL
             WHERE document_key = ?2 AND version_number = ?3",
            rusqlite::params![to_str, key_str, version_number],
          )?;
        } else {
          tx.execute(
            "UPDATE policy_versions SET status = ?1
             WHERE document_key = ?2 AND version_number = ?3",
            rusqlite::params![to_str, key_str, version_number],
          )?;
        }

        insert_transition(
          &tx,
          &key_str,
          version_number,
          Some(&row.status),
          &to_str,
          reason.as_deref(),
          &now_str,
        )?;

        let updated = load_version(&tx, &key_str, version_number)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        let chunks = load_chunk_ids(&tx, &updated.version_id)?;

        tx.commit()?;
        Ok(RawTransitionOutcome::Done(updated, chunks))
      })
      .await?;

    match raw {
      RawTransitionOutcome::NotFound => Err(Error::Core(
        vellum_core::Error::VersionNotFound { key, version: version_number },
      )),
      RawTransitionOutcome::Illegal { from } => Err(Error::Core(
        vellum_core::Error::InvalidTransition {
          key,
          version: version_number,
          from: VersionStatus::parse(&from).unwrap_or(VersionStatus::Draft),
          to: new_status,
        },
      )),
      RawTransitionOutcome::WouldDuplicateActive => Err(Error::Core(
        vellum_core::Error::InvariantViolation {
          key,
          detail: format!(
            "promoting version {version_number} would create a second \
             active version"
          ),
        },
      )),
      RawTransitionOutcome::Done(raw, chunks) => raw.into_version(chunks),
    }
  }

  async fn rollback(
    &self,
    key: DocumentKey,
    target_version: i64,
    reason: String,
  ) -> Result<Reversal> {
    if reason.trim().is_empty() {
      return Err(Error::Core(vellum_core::Error::MissingReason {
        key,
      }));
    }

    let key_str = key.as_str().to_owned();
    let reason_str = reason.clone();
    let now = Utc::now();
    let now_str = encode_dt(now);

    let raw: RawRollback = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(target) = load_version(&tx, &key_str, target_version)?
        else {
          return Ok(RawRollback::TargetNotFound);
        };
        if target.status != "superseded" && target.status != "retired" {
          return Ok(RawRollback::TargetNotRollbackable {
            status: target.status,
          });
        }

        let Some(current) = load_active(&tx, &key_str)? else {
          return Ok(RawRollback::NoActive);
        };

        // Demote first so the partial unique index never sees two ACTIVE
        // rows; the transaction hides the zero-ACTIVE midpoint.
        tx.execute(
          "UPDATE policy_versions
           SET status = 'superseded', superseded_by = ?1
           WHERE document_key = ?2 AND version_number = ?3",
          rusqlite::params![target_version, key_str, current.version_number],
        )?;
        tx.execute(
          "UPDATE policy_versions
           SET status = 'active', superseded_by = NULL
           WHERE document_key = ?1 AND version_number = ?2",
          rusqlite::params![key_str, target_version],
        )?;

        insert_transition(
          &tx,
          &key_str,
          current.version_number,
          Some("active"),
          "superseded",
          Some(&reason_str),
          &now_str,
        )?;
        insert_transition(
          &tx,
          &key_str,
          target_version,
          Some(&target.status),
          "active",
          Some(&reason_str),
          &now_str,
        )?;

        tx.commit()?;
        Ok(RawRollback::Done {
          demoted:  (current.version_number, current.version_id),
          promoted: (target_version, target.version_id),
        })
      })
      .await?;

    match raw {
      RawRollback::TargetNotFound => Err(Error::Core(
        vellum_core::Error::VersionNotFound { key, version: target_version },
      )),
      RawRollback::TargetNotRollbackable { status } => Err(Error::Core(
        vellum_core::Error::InvalidTransition {
          key,
          version: target_version,
          from: VersionStatus::parse(&status).unwrap_or(VersionStatus::Draft),
          to: VersionStatus::Active,
        },
      )),
      RawRollback::NoActive => {
        Err(Error::Core(vellum_core::Error::NoActiveVersion(key)))
      }
      RawRollback::Done { demoted, promoted } => {
        tracing::info!(
          key = %key,
          demoted = demoted.0,
          promoted = promoted.0,
          reason = %reason,
          "rollback applied"
        );
        Ok(Reversal {
          document_key: key,
          demoted:      VersionRef {
            version_number: demoted.0,
            version_id:     crate::encode::decode_uuid(&demoted.1)?,
          },
          promoted:     VersionRef {
            version_number: promoted.0,
            version_id:     crate::encode::decode_uuid(&promoted.1)?,
          },
          reason,
          recorded_at:  now,
        })
      }
    }
  }

  async fn get_active(
    &self,
    key: DocumentKey,
  ) -> Result<Option<PolicyVersion>> {
    self.fetch_version(key, None).await
  }

  async fn get_version(
    &self,
    key: DocumentKey,
    version_number: i64,
  ) -> Result<Option<PolicyVersion>> {
    self.fetch_version(key, Some(version_number)).await
  }

  async fn list_versions(
    &self,
    key: DocumentKey,
  ) -> Result<Vec<PolicyVersion>> {
    let key_str = key.as_str().to_owned();

    let raws: Vec<(RawVersion, Vec<String>)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM policy_versions
           WHERE document_key = ?1 ORDER BY version_number",
          RawVersion::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![key_str], RawVersion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for raw in rows {
          let chunks = load_chunk_ids(conn, &raw.version_id)?;
          out.push((raw, chunks));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, chunks)| raw.into_version(chunks))
      .collect()
  }

  async fn list_active(&self) -> Result<Vec<PolicyVersion>> {
    let raws: Vec<(RawVersion, Vec<String>)> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM policy_versions
           WHERE status = 'active' ORDER BY document_key",
          RawVersion::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawVersion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for raw in rows {
          let chunks = load_chunk_ids(conn, &raw.version_id)?;
          out.push((raw, chunks));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, chunks)| raw.into_version(chunks))
      .collect()
  }

  async fn audit_trail(
    &self,
    key: DocumentKey,
  ) -> Result<Vec<TransitionRecord>> {
    let key_str = key.as_str().to_owned();

    let raws: Vec<RawTransition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT document_key, version_number, from_status, to_status,
                  reason, recorded_at
           FROM transitions WHERE document_key = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![key_str], |row| {
            Ok(RawTransition {
              document_key:   row.get(0)?,
              version_number: row.get(1)?,
              from_status:    row.get(2)?,
              to_status:      row.get(3)?,
              reason:         row.get(4)?,
              recorded_at:    row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransition::into_record).collect()
  }
}

// ─── SQL helpers ─────────────────────────────────────────────────────────────
// Plain functions over `&rusqlite::Connection` so they compose inside
// `conn.call` closures and transactions alike.

fn load_version(
  conn: &rusqlite::Connection,
  key: &str,
  version_number: i64,
) -> rusqlite::Result<Option<RawVersion>> {
  let sql = format!(
    "SELECT {} FROM policy_versions
     WHERE document_key = ?1 AND version_number = ?2",
    RawVersion::COLUMNS
  );
  conn
    .query_row(&sql, rusqlite::params![key, version_number], RawVersion::from_row)
    .optional()
}

fn load_active(
  conn: &rusqlite::Connection,
  key: &str,
) -> rusqlite::Result<Option<RawVersion>> {
  let sql = format!(
    "SELECT {} FROM policy_versions
     WHERE document_key = ?1 AND status = 'active'",
    RawVersion::COLUMNS
  );
  conn
    .query_row(&sql, rusqlite::params![key], RawVersion::from_row)
    .optional()
}

fn load_chunk_ids(
  conn: &rusqlite::Connection,
  version_id: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(
    "SELECT chunk_id FROM version_chunks
     WHERE version_id = ?1 ORDER BY position",
  )?;
  stmt
    .query_map(rusqlite::params![version_id], |r| r.get(0))?
    .collect()
}

fn insert_transition(
  conn: &rusqlite::Connection,
  key: &str,
  version_number: i64,
  from: Option<&str>,
  to: &str,
  reason: Option<&str>,
  recorded_at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO transitions (
       transition_id, document_key, version_number,
       from_status, to_status, reason, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      key,
      version_number,
      from,
      to,
      reason,
      recorded_at,
    ],
  )?;
  Ok(())
}
