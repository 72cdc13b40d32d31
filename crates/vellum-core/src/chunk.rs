//! Chunk types — the unit of extracted, indexable text.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw chunk as produced by an extraction adapter, before it has an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkText {
  pub text:      String,
  /// Zero-based position within the document's extraction order.
  pub position:  u32,
  /// Best-effort page number, if the adapter could determine one.
  pub page_hint: Option<u32>,
}

/// A chunk with its minted identity, ready for the index. A chunk belongs to
/// exactly one policy version for its entire life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
  pub chunk_id:  Uuid,
  pub position:  u32,
  pub page_hint: Option<u32>,
  pub text:      String,
}

impl IndexedChunk {
  /// Assign fresh UUIDs to extracted chunks, preserving order.
  pub fn mint(chunks: Vec<ChunkText>) -> Vec<Self> {
    chunks
      .into_iter()
      .map(|c| Self {
        chunk_id:  Uuid::new_v4(),
        position:  c.position,
        page_hint: c.page_hint,
        text:      c.text,
      })
      .collect()
  }
}
