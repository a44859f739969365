use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bilibili::playurl::ResolveError;
use crate::download::DownloadError;
use crate::ffmpeg::CombineError;
use crate::link::{extract_identifier, LinkError};
use crate::models::{MediaId, MediaPaths, QualityVariant, ResolvedMedia};
use crate::prompt::Prompt;
use crate::traits::{Combiner, MetadataSource, StreamFetcher};
use crate::utils::{ensure_dir, format_bytes};

pub const EXIT_INTERRUPTED: u8 = 130;

/// Where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Input,
  Extract,
  Resolve,
  Select,
  Prepare,
  Download,
  Combine,
}

impl Stage {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Input => "input",
      Self::Extract => "extract",
      Self::Resolve => "resolve",
      Self::Select => "select",
      Self::Prepare => "prepare",
      Self::Download => "download",
      Self::Combine => "combine",
    }
  }

  pub fn exit_code(self) -> u8 {
    match self {
      Self::Input => 2,
      Self::Extract => 3,
      Self::Resolve => 4,
      Self::Select => 5,
      Self::Prepare => 6,
      Self::Download => 7,
      Self::Combine => 8,
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Idle,
  LinkProvided,
  IdentifierExtracted,
  MetadataResolved,
  QualitySelected,
  Downloading,
  Combining,
  CleaningUp,
  Done,
  Failed(Stage),
}

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("could not read input: {0}")]
  Prompt(#[source] io::Error),
  #[error("no {0} was given")]
  NoAnswer(&'static str),
  #[error(transparent)]
  Link(#[from] LinkError),
  #[error(transparent)]
  Resolve(#[from] ResolveError),
  #[error(
    "invalid quality index {input:?}, expected a number from 0 to {}",
    .count.saturating_sub(1)
  )]
  InvalidSelection { input: String, count: usize },
  #[error("cannot create {}: {source}", .path.display())]
  OutputDir { path: PathBuf, source: io::Error },
  #[error(transparent)]
  Download(#[from] DownloadError),
  #[error(transparent)]
  Combine(#[from] CombineError),
  #[error("interrupted")]
  Interrupted,
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineFailure {
  pub stage: Stage,
  #[source]
  pub error: PipelineError,
}

impl PipelineFailure {
  pub fn exit_code(&self) -> u8 {
    match self.error {
      PipelineError::Interrupted => EXIT_INTERRUPTED,
      _ => self.stage.exit_code(),
    }
  }
}

/// A failed intermediate delete. Logged, never escalated.
#[derive(Debug, Error)]
#[error("could not delete {}: {source}", .path.display())]
pub struct CleanupWarning {
  pub path: PathBuf,
  pub source: io::Error,
}

/// Best-effort removal of `paths`. Files that are already gone are fine.
pub fn remove_intermediates(paths: &[&Path]) -> Vec<CleanupWarning> {
  let mut warnings = Vec::new();
  for path in paths {
    match std::fs::remove_file(path) {
      Ok(()) => debug!("cleanup_removed path={}", path.display()),
      Err(err) if err.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        let warning = CleanupWarning {
          path: path.to_path_buf(),
          source,
        };
        warn!("cleanup_warning {}", warning);
        warnings.push(warning);
      }
    }
  }
  warnings
}

/// Numbered list shown before the quality question. Every variant is listed.
pub fn quality_listing(media: &ResolvedMedia) -> String {
  let mut listing = String::from("\nAvailable quality:\n");
  for (index, variant) in media.variants.iter().enumerate() {
    listing.push_str(&format!("{}. {}", index, variant.description));
    let mut details = Vec::new();
    if let Some(quality) = variant.quality {
      details.push(format!("qn {}", quality));
    }
    if let Some(size) = variant.size {
      details.push(format_bytes(size));
    }
    if !details.is_empty() {
      listing.push_str(&format!(" ({})", details.join(", ")));
    }
    listing.push('\n');
  }
  listing
}

pub fn select_variant(
  variants: &[QualityVariant],
  answer: &str,
) -> Result<QualityVariant, PipelineError> {
  let invalid = || PipelineError::InvalidSelection {
    input: answer.to_string(),
    count: variants.len(),
  };
  let index: usize = answer.trim().parse().map_err(|_| invalid())?;
  variants.get(index).cloned().ok_or_else(invalid)
}

fn ask(
  prompt: &mut dyn Prompt,
  question: &str,
  what: &'static str,
) -> Result<String, PipelineError> {
  match prompt.ask(question) {
    Ok(Some(answer)) if !answer.trim().is_empty() => Ok(answer),
    Ok(_) => Err(PipelineError::NoAnswer(what)),
    Err(err) => Err(PipelineError::Prompt(err)),
  }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct Outcome {
  pub id: MediaId,
  pub variant: QualityVariant,
  pub paths: MediaPaths,
  pub warnings: Vec<CleanupWarning>,
}

/// Sequences extract, resolve, select, download, combine and cleanup for a
/// single link.
pub struct Pipeline<M, F, C> {
  metadata: M,
  fetcher: F,
  combiner: C,
  output_dir: PathBuf,
  state: PipelineState,
}

impl<M, F, C> Pipeline<M, F, C>
where
  M: MetadataSource,
  F: StreamFetcher,
  C: Combiner,
{
  pub fn new(metadata: M, fetcher: F, combiner: C, output_dir: impl Into<PathBuf>) -> Self {
    Self {
      metadata,
      fetcher,
      combiner,
      output_dir: output_dir.into(),
      state: PipelineState::Idle,
    }
  }

  pub fn state(&self) -> PipelineState {
    self.state
  }

  fn enter(&mut self, next: PipelineState) {
    debug!("pipeline_state from={:?} to={:?}", self.state, next);
    self.state = next;
  }

  fn fail(&mut self, stage: Stage, error: impl Into<PipelineError>) -> PipelineFailure {
    self.enter(PipelineState::Failed(stage));
    PipelineFailure {
      stage,
      error: error.into(),
    }
  }

  /// Runs one link to completion. `interrupt` resolving while streams are
  /// downloading or being muxed stops the run and removes the intermediates.
  /// A failed or interrupted mux also removes the partial output.
  pub async fn run<I>(
    &mut self,
    prompt: &mut dyn Prompt,
    interrupt: I,
  ) -> Result<Outcome, PipelineFailure>
  where
    I: Future<Output = ()>,
  {
    tokio::pin!(interrupt);
    self.enter(PipelineState::Idle);

    let link = ask(prompt, "[INPUT] Link: ", "link").map_err(|err| self.fail(Stage::Input, err))?;
    self.enter(PipelineState::LinkProvided);

    let extracted = extract_identifier(&link).map_err(|err| self.fail(Stage::Extract, err))?;
    if extracted.fallback {
      warn!("link_fallback id={} only one number found after /play/", extracted.id);
    }
    let id = extracted.id;
    info!("link_parsed id={} kind={:?}", id, id.kind());
    self.enter(PipelineState::IdentifierExtracted);

    let media = match self.metadata.resolve(&id).await {
      Ok(media) => media,
      Err(err) => return Err(self.fail(Stage::Resolve, err)),
    };
    self.enter(PipelineState::MetadataResolved);

    let question = format!("{}\n[INPUT] Select quality index (ex: 1): ", quality_listing(&media));
    let variant = ask(prompt, &question, "quality index")
      .and_then(|answer| select_variant(&media.variants, &answer))
      .map_err(|err| self.fail(Stage::Select, err))?;
    info!("quality_selected id={} quality={}", id, variant.description);
    self.enter(PipelineState::QualitySelected);

    ensure_dir(&self.output_dir).map_err(|source| {
      let path = self.output_dir.clone();
      self.fail(Stage::Prepare, PipelineError::OutputDir { path, source })
    })?;
    let paths = MediaPaths::new(&self.output_dir, &id, &variant.description);

    self.enter(PipelineState::Downloading);
    let downloads = async {
      tokio::try_join!(
        self.fetcher.fetch("video", &variant.stream_url, &paths.video),
        self.fetcher.fetch("audio", &media.audio_url, &paths.audio),
      )
    };
    let downloaded = tokio::select! {
      result = downloads => result.map_err(PipelineError::from),
      _ = &mut interrupt => Err(PipelineError::Interrupted),
    };
    if let Err(err) = downloaded {
      remove_intermediates(&paths.intermediates());
      return Err(self.fail(Stage::Download, err));
    }

    self.enter(PipelineState::Combining);
    let combined = tokio::select! {
      result = self.combiner.combine(&paths.video, &paths.audio, &paths.output) => {
        result.map_err(PipelineError::from)
      }
      _ = &mut interrupt => Err(PipelineError::Interrupted),
    };

    self.enter(PipelineState::CleaningUp);
    let mut leftovers = paths.intermediates().to_vec();
    if combined.is_err() {
      leftovers.push(&paths.output);
    }
    let warnings = remove_intermediates(&leftovers);

    match combined {
      Ok(_) => {
        self.enter(PipelineState::Done);
        info!("pipeline_done output={}", paths.output.display());
        Ok(Outcome {
          id,
          variant,
          paths,
          warnings,
        })
      }
      Err(err) => Err(self.fail(Stage::Combine, err)),
    }
  }
}
