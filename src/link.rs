use thiserror::Error;
use url::Url;

use crate::models::{is_numeric, MediaId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
  #[error("invalid link: {0}")]
  InvalidLink(String),
  #[error("unsupported link shape: {0}")]
  UnsupportedLinkShape(String),
}

/// Identifier pulled out of a page link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedId {
  pub id: MediaId,
  /// Set when a `/play/` link carried a single number and it was used as-is.
  pub fallback: bool,
}

/// Parses `/video/{id}` and `/play/{series}/{episode}` page links.
pub fn extract_identifier(page_url: &str) -> Result<ExtractedId, LinkError> {
  let parsed = Url::parse(page_url.trim())
    .map_err(|err| LinkError::InvalidLink(format!("{} ({})", page_url.trim(), err)))?;
  let segments: Vec<&str> = parsed
    .path_segments()
    .map(|segments| segments.collect())
    .unwrap_or_default();

  if let Some(index) = segments.iter().position(|segment| *segment == "video") {
    let value = segments
      .get(index + 1)
      .copied()
      .filter(|value| !value.is_empty())
      .ok_or_else(|| LinkError::InvalidLink("nothing follows /video/".to_string()))?;
    let id = MediaId::parse(value)
      .ok_or_else(|| LinkError::InvalidLink(format!("non-numeric video id {:?}", value)))?;
    return Ok(ExtractedId { id, fallback: false });
  }

  if segments.iter().any(|segment| *segment == "play") {
    let numbers: Vec<&str> = segments
      .iter()
      .copied()
      .filter(|segment| is_numeric(segment))
      .collect();
    let (value, fallback) = match numbers.as_slice() {
      [] => return Err(LinkError::InvalidLink("no numeric segment after /play/".to_string())),
      [only] => (*only, true),
      [_, episode, ..] => (*episode, false),
    };
    let id = MediaId::parse(value)
      .ok_or_else(|| LinkError::InvalidLink(format!("non-numeric play id {:?}", value)))?;
    return Ok(ExtractedId { id, fallback });
  }

  Err(LinkError::UnsupportedLinkShape(parsed.path().to_string()))
}
