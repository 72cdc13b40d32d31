//! A plain-text implementation of
//! [`Extractor`](vellum_core::adapters::Extractor).
//!
//! Splits UTF-8 text into paragraph chunks and lifts a title, an optional
//! reference number and numbered section headings into metadata. PDF layout
//! adapters live outside this workspace behind the same trait; this one
//! covers the CLI's text documents and the test suite.

use thiserror::Error;
use vellum_core::{
  adapters::{Extraction, Extractor},
  chunk::ChunkText,
  version::DocumentMetadata,
};

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("document is not valid UTF-8 text: {0}")]
  NotText(#[from] std::string::FromUtf8Error),

  #[error("document contains no extractable text")]
  Empty,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
  fn metadata(paragraphs: &[&str]) -> DocumentMetadata {
    let title = paragraphs
      .first()
      .and_then(|p| p.lines().next())
      .map(|l| l.trim().to_owned());

    let reference = paragraphs
      .iter()
      .flat_map(|p| p.lines())
      .find_map(|line| {
        line
          .trim()
          .strip_prefix("Reference:")
          .map(|r| r.trim().to_owned())
      });

    // Numbered headings ("3. Visitor screening") become section labels.
    let sections = paragraphs
      .iter()
      .filter_map(|p| {
        let first = p.lines().next()?.trim();
        let digits = first.chars().take_while(char::is_ascii_digit).count();
        (digits > 0 && first[digits..].starts_with('.'))
          .then(|| first.to_owned())
      })
      .collect();

    DocumentMetadata {
      title,
      reference,
      sections,
      extra: serde_json::Value::Null,
    }
  }
}

impl Extractor for PlainTextExtractor {
  type Error = ExtractError;

  async fn extract(&self, bytes: Vec<u8>) -> Result<Extraction, ExtractError> {
    let text = String::from_utf8(bytes)?;

    let paragraphs: Vec<&str> = text
      .split("\n\n")
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .collect();

    if paragraphs.is_empty() {
      return Err(ExtractError::Empty);
    }

    let metadata = Self::metadata(&paragraphs);
    let chunks = paragraphs
      .into_iter()
      .enumerate()
      .map(|(i, p)| ChunkText {
        text:      p.to_owned(),
        position:  i as u32,
        page_hint: None,
      })
      .collect();

    Ok(Extraction { metadata, chunks })
  }
}

#[cfg(test)]
mod tests {
  use vellum_core::adapters::Extractor as _;

  use super::*;

  #[tokio::test]
  async fn splits_paragraphs_in_order() {
    let text = b"Visitor Policy\n\nReference: HR-014\n\n1. Scope\nAll wards."
      .to_vec();
    let extraction = PlainTextExtractor.extract(text).await.unwrap();

    assert_eq!(extraction.chunks.len(), 3);
    assert_eq!(extraction.chunks[0].position, 0);
    assert_eq!(extraction.chunks[2].position, 2);
    assert_eq!(extraction.metadata.title.as_deref(), Some("Visitor Policy"));
    assert_eq!(extraction.metadata.reference.as_deref(), Some("HR-014"));
    assert_eq!(extraction.metadata.sections, vec!["1. Scope".to_owned()]);
  }

  #[tokio::test]
  async fn rejects_binary_input() {
    let err = PlainTextExtractor
      .extract(vec![0xff, 0xfe, 0x00, 0x01])
      .await
      .unwrap_err();
    assert!(matches!(err, ExtractError::NotText(_)));
  }

  #[tokio::test]
  async fn rejects_whitespace_only_input() {
    let err = PlainTextExtractor
      .extract(b"  \n\n   \n".to_vec())
      .await
      .unwrap_err();
    assert!(matches!(err, ExtractError::Empty));
  }
}
