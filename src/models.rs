use std::fmt;
use std::path::{Path, PathBuf};

/// Which playurl query shape an identifier maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  /// 4 to 8 digits, looked up with `ep_id`.
  Episode,
  /// Any other numeric id, looked up with `aid`.
  Asset,
}

/// Numeric media identifier taken from a page link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaId(String);

impl MediaId {
  /// Returns `None` unless `value` is a non-empty run of ASCII digits.
  pub fn parse(value: &str) -> Option<Self> {
    if is_numeric(value) {
      Some(Self(value.to_string()))
    } else {
      None
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn kind(&self) -> MediaKind {
    if (4..=8).contains(&self.0.len()) {
      MediaKind::Episode
    } else {
      MediaKind::Asset
    }
  }
}

impl fmt::Display for MediaId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

pub fn is_numeric(value: &str) -> bool {
  !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

/// One selectable video quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityVariant {
  pub description: String,
  pub stream_url: String,
  pub quality: Option<i64>,
  pub size: Option<u64>,
}

impl QualityVariant {
  pub fn new(description: impl Into<String>, stream_url: impl Into<String>) -> Self {
    Self {
      description: description.into(),
      stream_url: stream_url.into(),
      quality: None,
      size: None,
    }
  }
}

/// Video catalog plus the audio stream. Only built when both halves exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
  pub variants: Vec<QualityVariant>,
  pub audio_url: String,
}

/// Local files for one run: the two intermediates and the muxed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPaths {
  pub video: PathBuf,
  pub audio: PathBuf,
  pub output: PathBuf,
}

impl MediaPaths {
  pub fn new(dir: &Path, id: &MediaId, description: &str) -> Self {
    let stem = format!("{}_{}", id, crate::utils::sanitize_filename(description));
    Self {
      video: dir.join(format!("{}_video.m4v", stem)),
      audio: dir.join(format!("{}_audio.mp4", stem)),
      output: dir.join(format!("{}_final.mp4", stem)),
    }
  }

  pub fn intermediates(&self) -> [&Path; 2] {
    [&self.video, &self.audio]
  }
}
