use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_FFMPEG_PATH;
use crate::traits::Combiner;

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum CombineError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
  #[error("ffmpeg exited with {}: {stderr}", exit_label(.code))]
  Failed { code: Option<i32>, stderr: String },
}

fn exit_label(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("status {}", code),
    None => "a signal".to_string(),
  }
}

/// Stream-copy remux of a video and an audio file into mp4. Nothing is re-encoded.
pub fn remux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
  let mut args: Vec<OsString> = Vec::new();
  args.push("-hide_banner".into());
  args.push("-y".into());
  args.push("-i".into());
  args.push(video.as_os_str().to_owned());
  args.push("-i".into());
  args.push(audio.as_os_str().to_owned());
  args.push("-vcodec".into());
  args.push("copy".into());
  args.push("-acodec".into());
  args.push("copy".into());
  args.push("-f".into());
  args.push("mp4".into());
  args.push(output.as_os_str().to_owned());
  args
}

/// Runs ffmpeg to completion. Dropping the returned future kills the child.
pub async fn run_ffmpeg(program: &Path, args: &[OsString]) -> Result<(), CombineError> {
  let output = Command::new(program)
    .args(args)
    .stdin(Stdio::null())
    .kill_on_drop(true)
    .output()
    .await
    .map_err(|source| CombineError::Spawn {
      program: program.display().to_string(),
      source,
    })?;

  if output.status.success() {
    return Ok(());
  }

  let stderr = String::from_utf8_lossy(&output.stderr);
  Err(CombineError::Failed {
    code: output.status.code(),
    stderr: tail_lines(&stderr, STDERR_TAIL_LINES),
  })
}

fn tail_lines(text: &str, count: usize) -> String {
  let lines: Vec<&str> = text.trim().lines().collect();
  let start = lines.len().saturating_sub(count);
  lines[start..].join("\n")
}

/// The external ffmpeg binary.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
  program: PathBuf,
}

impl Ffmpeg {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
    }
  }

  pub fn program(&self) -> &Path {
    &self.program
  }
}

impl Default for Ffmpeg {
  fn default() -> Self {
    Self::new(DEFAULT_FFMPEG_PATH)
  }
}

#[async_trait]
impl Combiner for Ffmpeg {
  async fn combine(
    &self,
    video: &Path,
    audio: &Path,
    output: &Path,
  ) -> Result<PathBuf, CombineError> {
    let args = remux_args(video, audio, output);
    info!(
      "ffmpeg_start video={} audio={} output={}",
      video.display(),
      audio.display(),
      output.display()
    );
    debug!("ffmpeg_args program={} args={:?}", self.program.display(), args);

    match run_ffmpeg(&self.program, &args).await {
      Ok(()) => {
        info!("ffmpeg_done status=ok output={}", output.display());
        Ok(output.to_path_buf())
      }
      Err(err) => {
        warn!("ffmpeg_done status=err msg={}", err);
        Err(err)
      }
    }
  }
}
