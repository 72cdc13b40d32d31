//! [`SqliteChunkIndex`] — a SQLite-backed implementation of
//! [`ChunkIndex`](vellum_core::adapters::ChunkIndex).
//!
//! Stands in for an external vector/keyword store behind the same narrow
//! contract: upsert, status flip, delete-by-version, status-filtered query.
//! Chunks of superseded and retired versions stay in the table; the status
//! column keeps them out of default queries.

use std::path::Path;

use uuid::Uuid;
use vellum_core::{
  adapters::ChunkIndex, chunk::IndexedChunk, status::VersionStatus,
};

use crate::{
  Error, Result,
  encode::{decode_status, decode_uuid, encode_uuid},
};

const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS indexed_chunks (
    chunk_id   TEXT PRIMARY KEY,
    version_id TEXT NOT NULL,
    position   INTEGER NOT NULL,
    page_hint  INTEGER,
    status     TEXT NOT NULL,
    text       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS indexed_chunks_version_idx
    ON indexed_chunks(version_id);
CREATE INDEX IF NOT EXISTS indexed_chunks_status_idx
    ON indexed_chunks(status);
";

/// One stored chunk row, as returned by [`SqliteChunkIndex::query`].
#[derive(Debug, Clone)]
pub struct StoredChunk {
  pub chunk_id:   Uuid,
  pub version_id: Uuid,
  pub position:   u32,
  pub page_hint:  Option<u32>,
  pub status:     VersionStatus,
  pub text:       String,
}

#[derive(Clone)]
pub struct SqliteChunkIndex {
  conn: tokio_rusqlite::Connection,
}

impl SqliteChunkIndex {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let index = Self { conn };
    index.init_schema().await?;
    Ok(index)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let index = Self { conn };
    index.init_schema().await?;
    Ok(index)
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

  /// Status-filtered search over chunk text (SQL LIKE). The default caller
  /// passes `Active`; audit tooling may query superseded or retired chunks
  /// explicitly.
  pub async fn query(
    &self,
    status: VersionStatus,
    text: Option<&str>,
  ) -> Result<Vec<StoredChunk>> {
    let status_str = status.as_str().to_owned();
    let pattern = text.map(|t| format!("%{t}%"));

    let raws: Vec<(String, String, i64, Option<i64>, String, String)> = self
      .conn
      .call(move |conn| {
        let sql = if pattern.is_some() {
          "SELECT chunk_id, version_id, position, page_hint, status, text
           FROM indexed_chunks
           WHERE status = ?1 AND text LIKE ?2
           ORDER BY version_id, position"
        } else {
          "SELECT chunk_id, version_id, position, page_hint, status, text
           FROM indexed_chunks
           WHERE status = ?1
           ORDER BY version_id, position"
        };
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
          ))
        };
        let rows = if let Some(p) = pattern {
          stmt
            .query_map(rusqlite::params![status_str, p], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          stmt
            .query_map(rusqlite::params![status_str], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(cid, vid, pos, page, status, text)| {
        Ok(StoredChunk {
          chunk_id:   decode_uuid(&cid)?,
          version_id: decode_uuid(&vid)?,
          position:   pos as u32,
          page_hint:  page.map(|p| p as u32),
          status:     decode_status(&status)?,
          text,
        })
      })
      .collect()
  }

  /// Number of chunks stored for a version, regardless of status.
  pub async fn count_for_version(&self, version_id: Uuid) -> Result<usize> {
    let vid = encode_uuid(version_id);
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM indexed_chunks WHERE version_id = ?1",
          rusqlite::params![vid],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(count as usize)
  }
}

impl ChunkIndex for SqliteChunkIndex {
  type Error = Error;

  async fn upsert(
    &self,
    version_id: Uuid,
    status: VersionStatus,
    chunks: Vec<IndexedChunk>,
  ) -> Result<()> {
    let vid = encode_uuid(version_id);
    let status_str = status.as_str().to_owned();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for chunk in &chunks {
          tx.execute(
            "INSERT OR REPLACE INTO indexed_chunks
               (chunk_id, version_id, position, page_hint, status, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              encode_uuid(chunk.chunk_id),
              vid,
              chunk.position as i64,
              chunk.page_hint.map(|p| p as i64),
              status_str,
              chunk.text,
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_status(
    &self,
    version_id: Uuid,
    status: VersionStatus,
  ) -> Result<()> {
    let vid = encode_uuid(version_id);
    let status_str = status.as_str().to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE indexed_chunks SET status = ?1 WHERE version_id = ?2",
          rusqlite::params![status_str, vid],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_by_version(&self, version_id: Uuid) -> Result<()> {
    let vid = encode_uuid(version_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM indexed_chunks WHERE version_id = ?1",
          rusqlite::params![vid],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
