//! `vellum` — policy document version control from the command line.
//!
//! # Usage
//!
//! ```
//! vellum detect
//! vellum sync
//! vellum rollback --key visitor-policy --to-version 1 --reason "v2 published in error"
//! vellum retire --key visitor-policy --reason "policy withdrawn"
//! vellum history --key visitor-policy
//! ```
//!
//! Paths come from `vellum.toml` (or the file named with `--config`); flags
//! override the file, which overrides the defaults.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vellum_core::{ledger::VersionLedger as _, version::DocumentKey};
use vellum_engine::{
  LocalDocumentFiles, PlainTextExtractor, RollbackManager, SyncOptions,
  SyncOrchestrator,
};
use vellum_store_sqlite::{SqliteChunkIndex, SqliteLedger};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vellum", about = "Version control for policy documents")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "vellum.toml")]
  config: PathBuf,

  /// Document root holding `staging/`, `active/` and `archive/`.
  #[arg(long)]
  root: Option<PathBuf>,

  /// Path of the version ledger database.
  #[arg(long)]
  ledger_db: Option<PathBuf>,

  /// Path of the chunk index database.
  #[arg(long)]
  index_db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Classify staged documents against the ledger without changing anything.
  Detect,
  /// Ingest new and changed staged documents, retire removed ones.
  Sync,
  /// Revert a document to an earlier version.
  Rollback {
    /// Document key, e.g. `visitor-policy`.
    #[arg(long)]
    key:        String,
    /// Version number to promote back to ACTIVE.
    #[arg(long)]
    to_version: i64,
    /// Reason for the reversal; recorded in the audit log.
    #[arg(long)]
    reason:     String,
  },
  /// Withdraw a document's active version with no replacement.
  Retire {
    #[arg(long)]
    key:    String,
    #[arg(long)]
    reason: Option<String>,
  },
  /// Print a document's version history and audit trail.
  History {
    #[arg(long)]
    key: String,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional `vellum.toml` config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  root:         Option<PathBuf>,
  ledger_db:    Option<PathBuf>,
  index_db:     Option<PathBuf>,
  concurrency:  Option<usize>,
  timeout_secs: Option<u64>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let file_cfg: ConfigFile = match std::fs::read_to_string(&cli.config) {
    Ok(raw) => toml::from_str(&raw)
      .with_context(|| format!("parsing {}", cli.config.display()))?,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::default(),
    Err(e) => {
      return Err(e)
        .with_context(|| format!("reading {}", cli.config.display()));
    }
  };

  let root = cli
    .root
    .or(file_cfg.root)
    .unwrap_or_else(|| PathBuf::from("documents"));
  let ledger_db = cli
    .ledger_db
    .or(file_cfg.ledger_db)
    .unwrap_or_else(|| PathBuf::from("vellum.db"));
  let index_db = cli
    .index_db
    .or(file_cfg.index_db)
    .unwrap_or_else(|| PathBuf::from("vellum-index.db"));

  let defaults = SyncOptions::default();
  let options = SyncOptions {
    concurrency: file_cfg.concurrency.unwrap_or(defaults.concurrency),
    timeout:     file_cfg
      .timeout_secs
      .map(Duration::from_secs)
      .unwrap_or(defaults.timeout),
  };

  let ledger = SqliteLedger::open(&ledger_db)
    .await
    .with_context(|| format!("opening ledger {}", ledger_db.display()))?;
  let index = SqliteChunkIndex::open(&index_db)
    .await
    .with_context(|| format!("opening chunk index {}", index_db.display()))?;
  let files = LocalDocumentFiles::open(&root)
    .await
    .with_context(|| format!("opening document root {}", root.display()))?;

  match cli.command {
    Command::Detect => {
      let orchestrator = SyncOrchestrator::new(
        ledger,
        PlainTextExtractor,
        index,
        files,
        options,
      );
      let plan = orchestrator.detect().await.context("detecting changes")?;

      for entry in &plan.new {
        println!("NEW       {} ({})", entry.document_key, entry.filename);
      }
      for entry in &plan.changed {
        println!(
          "CHANGED   {} ({}, supersedes v{})",
          entry.document_key, entry.filename, entry.active_version
        );
      }
      for entry in &plan.deleted {
        println!(
          "DELETED   {} (will retire v{})",
          entry.document_key, entry.active_version
        );
      }
      for key in &plan.unchanged {
        println!("UNCHANGED {key}");
      }
      if plan.is_noop() {
        println!("nothing to do");
      }
    }

    Command::Sync => {
      let orchestrator = SyncOrchestrator::new(
        ledger,
        PlainTextExtractor,
        index,
        files,
        options,
      );
      let report = orchestrator.sync().await.context("running sync")?;

      println!(
        "created {}  superseded {}  retired {}  unchanged {}  failed {}",
        report.created,
        report.superseded,
        report.retired,
        report.unchanged,
        report.failed_count(),
      );
      if !report.is_clean() {
        for failure in &report.failed {
          eprintln!(
            "failed: {} ({}): {}",
            failure.document_key,
            failure.filename.as_deref().unwrap_or("-"),
            failure.error,
          );
        }
        std::process::exit(1);
      }
    }

    Command::Rollback { key, to_version, reason } => {
      let manager = RollbackManager::new(ledger, index, files);
      let reversal = manager
        .rollback(DocumentKey::new(key), to_version, &reason)
        .await
        .context("rolling back")?;
      println!(
        "{}: v{} demoted, v{} active again",
        reversal.document_key,
        reversal.demoted.version_number,
        reversal.promoted.version_number,
      );
    }

    Command::Retire { key, reason } => {
      let manager = RollbackManager::new(ledger, index, files);
      let retired = manager
        .retire(DocumentKey::new(key), reason)
        .await
        .context("retiring")?;
      println!(
        "{}: v{} retired",
        retired.document_key, retired.version_number
      );
    }

    Command::History { key } => {
      let key = DocumentKey::new(key);
      let versions = ledger
        .list_versions(key.clone())
        .await
        .context("listing versions")?;
      if versions.is_empty() {
        println!("no versions recorded for {key}");
        return Ok(());
      }

      for v in &versions {
        let superseded_by = v
          .superseded_by
          .map(|n| format!(" -> v{n}"))
          .unwrap_or_default();
        println!(
          "v{}  {:<10}  {}  {}  {}{}",
          v.version_number,
          v.status.as_str(),
          v.content_hash.get(..12).unwrap_or(&v.content_hash),
          v.version_date.format("%Y-%m-%d %H:%M:%S"),
          v.source_file,
          superseded_by,
        );
      }

      println!();
      let trail =
        ledger.audit_trail(key).await.context("loading audit trail")?;
      for record in &trail {
        println!(
          "{}  v{}  {} -> {}  {}",
          record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
          record.version_number,
          record.from.map(|s| s.as_str()).unwrap_or("created"),
          record.to.as_str(),
          record.reason.as_deref().unwrap_or("-"),
        );
      }
    }
  }

  Ok(())
}
