// Seams between the pipeline and the outside world

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::bilibili::playurl::ResolveError;
use crate::download::DownloadError;
use crate::ffmpeg::CombineError;
use crate::models::{MediaId, ResolvedMedia};

/// Looks up the stream catalog for an identifier.
#[async_trait]
pub trait MetadataSource: Send + Sync {
  async fn resolve(&self, id: &MediaId) -> Result<ResolvedMedia, ResolveError>;
}

/// Copies one remote stream to a local file.
#[async_trait]
pub trait StreamFetcher: Send + Sync {
  /// `label` names the transfer for progress output ("video", "audio").
  async fn fetch(
    &self,
    label: &str,
    url: &str,
    destination: &Path,
  ) -> Result<PathBuf, DownloadError>;
}

/// Muxes a video file and an audio file into one container.
#[async_trait]
pub trait Combiner: Send + Sync {
  async fn combine(
    &self,
    video: &Path,
    audio: &Path,
    output: &Path,
  ) -> Result<PathBuf, CombineError>;
}
