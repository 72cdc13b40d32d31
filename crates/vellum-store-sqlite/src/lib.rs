//! SQLite backend for the Vellum version ledger and chunk index.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The ledger's paired state
//! transitions (supersede-on-ingest, rollback) execute inside explicit
//! transactions on the single writer connection, which is what serializes
//! them per document key.

mod chunk_index;
mod encode;
mod schema;
mod store;

pub mod error;

pub use chunk_index::{SqliteChunkIndex, StoredChunk};
pub use error::{Error, Result};
pub use store::SqliteLedger;
