//! Core types and trait definitions for the Vellum policy sync engine.
//!
//! This crate is deliberately free of database and I/O dependencies; all
//! other crates in the workspace depend on it.

pub mod adapters;
pub mod chunk;
pub mod detect;
pub mod error;
pub mod ledger;
pub mod report;
pub mod status;
pub mod version;

pub use error::{Error, Result};
