//! SQL schema for the Vellum ledger database.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Ledger schema DDL.
///
/// The partial unique index on `(document_key) WHERE status = 'active'`
/// makes the single-ACTIVE-version invariant a database constraint rather
/// than an application-level check: any write sequence that would produce
/// two ACTIVE rows for one document fails atomically.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per (document_key, version_number). Content columns are frozen at
-- insert; only status and superseded_by are ever updated.
CREATE TABLE IF NOT EXISTS policy_versions (
    version_id      TEXT PRIMARY KEY,
    document_key    TEXT NOT NULL,
    version_number  INTEGER NOT NULL,
    content_hash    TEXT NOT NULL,
    status          TEXT NOT NULL,   -- 'draft' | 'active' | 'superseded' | 'retired'
    version_date    TEXT NOT NULL,   -- ISO 8601 UTC; store-assigned
    effective_date  TEXT,            -- ISO 8601 date
    expiration_date TEXT,            -- ISO 8601 date
    superseded_by   INTEGER,         -- forward pointer to the replacing version
    source_file     TEXT NOT NULL,
    metadata_json   TEXT NOT NULL DEFAULT '{}',
    UNIQUE (document_key, version_number)
);

CREATE UNIQUE INDEX IF NOT EXISTS policy_versions_active_idx
    ON policy_versions(document_key) WHERE status = 'active';

-- A chunk belongs to exactly one version; the global primary key enforces
-- disjointness across versions.
CREATE TABLE IF NOT EXISTS version_chunks (
    chunk_id    TEXT PRIMARY KEY,
    version_id  TEXT NOT NULL REFERENCES policy_versions(version_id),
    position    INTEGER NOT NULL
);

-- Append-only transition audit log. No UPDATE or DELETE is ever issued
-- against this table.
CREATE TABLE IF NOT EXISTS transitions (
    transition_id  TEXT PRIMARY KEY,
    document_key   TEXT NOT NULL,
    version_number INTEGER NOT NULL,
    from_status    TEXT,             -- NULL for the creation pseudo-transition
    to_status      TEXT NOT NULL,
    reason         TEXT,
    recorded_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS policy_versions_key_idx
    ON policy_versions(document_key);
CREATE INDEX IF NOT EXISTS version_chunks_version_idx
    ON version_chunks(version_id);
CREATE INDEX IF NOT EXISTS transitions_key_idx
    ON transitions(document_key);

PRAGMA user_version = 1;
";
