//! Content addressing — the stable fingerprint that decides whether two
//! byte-streams are "the same document" for sync purposes.

use std::io::{self, Read};

use sha2::{Digest, Sha256};

/// Streaming SHA-256 over a reader; arbitrarily large documents never
/// require full buffering. Returns the lowercase hex digest.
pub fn fingerprint(mut reader: impl Read) -> io::Result<String> {
  let mut hasher = Sha256::new();
  let mut buf = [0u8; 8192];
  loop {
    let n = reader.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}
