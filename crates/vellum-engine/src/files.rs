//! Local-filesystem implementation of
//! [`DocumentFiles`](vellum_core::adapters::DocumentFiles).
//!
//! One root directory with `staging/`, `active/` and `archive/`
//! subdirectories. Listings are sorted so classification is deterministic;
//! archive moves never overwrite — a name collision gets a timestamp
//! suffix.

use std::{
  io,
  path::{Path, PathBuf},
};

use chrono::Utc;
use vellum_core::adapters::{DocumentFiles, Location};

#[derive(Debug, Clone)]
pub struct LocalDocumentFiles {
  root: PathBuf,
}

impl LocalDocumentFiles {
  /// Open a document root, creating the three location directories if they
  /// do not exist yet.
  pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
    let root = root.into();
    for location in [Location::Staging, Location::Active, Location::Archive] {
      tokio::fs::create_dir_all(root.join(location.as_str())).await?;
    }
    Ok(Self { root })
  }

  fn dir(&self, location: Location) -> PathBuf {
    self.root.join(location.as_str())
  }

  /// Absolute path of a file within a location.
  pub fn path_of(&self, location: Location, filename: &str) -> PathBuf {
    self.dir(location).join(filename)
  }

  /// Suffix a colliding archive name with a UTC timestamp, keeping the
  /// extension: `policy.pdf` becomes `policy.20260823T101500123.pdf`.
  fn timestamped(filename: &str) -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
    match filename.rsplit_once('.') {
      Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{stamp}.{ext}"),
      _ => format!("{filename}.{stamp}"),
    }
  }

  async fn free_destination(dir: &Path, filename: &str) -> io::Result<PathBuf> {
    let plain = dir.join(filename);
    if !tokio::fs::try_exists(&plain).await? {
      return Ok(plain);
    }
    Ok(dir.join(Self::timestamped(filename)))
  }
}

impl DocumentFiles for LocalDocumentFiles {
  type Error = io::Error;

  async fn list(&self, location: Location) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(self.dir(location)).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      if !entry.file_type().await?.is_file() {
        continue;
      }
      // Non-UTF-8 names are filtered out of the listing, not fatal.
      if let Some(name) = entry.file_name().to_str() {
        names.push(name.to_owned());
      }
    }
    names.sort();
    Ok(names)
  }

  async fn read(
    &self,
    location: Location,
    filename: String,
  ) -> io::Result<Vec<u8>> {
    tokio::fs::read(self.dir(location).join(filename)).await
  }

  async fn copy_document(
    &self,
    filename: String,
    from: Location,
    to: Location,
  ) -> io::Result<()> {
    let src = self.dir(from).join(&filename);
    let dst = self.dir(to).join(&filename);
    tokio::fs::copy(src, dst).await?;
    Ok(())
  }

  async fn move_document(
    &self,
    filename: String,
    from: Location,
    to: Location,
  ) -> io::Result<()> {
    let src = self.dir(from).join(&filename);
    let dst = if to == Location::Archive {
      Self::free_destination(&self.dir(to), &filename).await?
    } else {
      self.dir(to).join(&filename)
    };
    tokio::fs::rename(src, dst).await?;
    Ok(())
  }
}
