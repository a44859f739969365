use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::traits::StreamFetcher;
use crate::utils::format_bytes;

#[derive(Debug, Error)]
pub enum DownloadError {
  #[error("request to {url} failed: {source}")]
  Request { url: String, source: reqwest::Error },
  #[error("{url} answered {status}")]
  Status { url: String, status: StatusCode },
  #[error("transfer from {url} broke after {received} bytes: {source}")]
  Transfer {
    url: String,
    received: u64,
    source: reqwest::Error,
  },
  #[error("writing {} failed: {source}", .path.display())]
  Io { path: PathBuf, source: io::Error },
  #[error("{} ended at {received} of {expected} bytes", .path.display())]
  Incomplete { path: PathBuf, expected: u64, received: u64 },
}

/// Receives byte counts while a transfer runs. Calls happen on the download
/// task, so implementations must return quickly.
pub trait ProgressObserver: Send + Sync {
  fn on_start(&self, _expected: Option<u64>) {}
  fn on_chunk(&self, chunk: u64, received: u64, expected: Option<u64>);
  fn on_finish(&self, _received: u64) {}
  fn on_abandon(&self) {}
}

pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
  fn on_chunk(&self, _chunk: u64, _received: u64, _expected: Option<u64>) {}
}

/// One terminal bar, created once the expected size is known.
pub struct BarProgress {
  multi: MultiProgress,
  label: String,
  bar: OnceLock<ProgressBar>,
}

impl BarProgress {
  fn bar(&self) -> Option<&ProgressBar> {
    self.bar.get()
  }
}

impl ProgressObserver for BarProgress {
  fn on_start(&self, expected: Option<u64>) {
    let bar = match expected {
      Some(total) => {
        let bar = ProgressBar::new(total);
        bar.set_style(
          ProgressStyle::with_template(
            "{msg:>6} [{bar:20.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} {eta}",
          )
          .unwrap_or_else(|_| ProgressStyle::default_bar())
          .progress_chars("=> "),
        );
        bar
      }
      None => {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
          ProgressStyle::with_template("{msg:>6} {spinner} {bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar
      }
    };
    bar.set_message(self.label.clone());
    let _ = self.bar.set(self.multi.add(bar));
  }

  fn on_chunk(&self, chunk: u64, _received: u64, _expected: Option<u64>) {
    if let Some(bar) = self.bar() {
      bar.inc(chunk);
    }
  }

  fn on_finish(&self, _received: u64) {
    if let Some(bar) = self.bar() {
      bar.finish();
    }
  }

  fn on_abandon(&self) {
    if let Some(bar) = self.bar() {
      bar.abandon();
    }
  }
}

/// Hands out one observer per transfer; concurrent transfers share the
/// terminal through a `MultiProgress`.
#[derive(Clone)]
pub enum ProgressReporter {
  Terminal(MultiProgress),
  Silent,
}

impl ProgressReporter {
  pub fn terminal() -> Self {
    Self::Terminal(MultiProgress::new())
  }

  pub fn observer(&self, label: &str) -> Box<dyn ProgressObserver> {
    match self {
      Self::Terminal(multi) => Box::new(BarProgress {
        multi: multi.clone(),
        label: label.to_string(),
        bar: OnceLock::new(),
      }),
      Self::Silent => Box::new(SilentProgress),
    }
  }

  /// Log sink for the fmt layer. Bars are hidden while a line is written so
  /// log output does not tear through them.
  pub fn log_writer(&self) -> LogWriter {
    match self {
      Self::Terminal(multi) => LogWriter {
        multi: Some(multi.clone()),
      },
      Self::Silent => LogWriter { multi: None },
    }
  }
}

/// stderr writer that suspends the terminal bars around each write.
#[derive(Clone)]
pub struct LogWriter {
  multi: Option<MultiProgress>,
}

impl Write for LogWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    match &self.multi {
      Some(multi) => multi.suspend(|| io::stderr().write(buf)),
      None => io::stderr().write(buf),
    }
  }

  fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
    match &self.multi {
      Some(multi) => multi.suspend(|| io::stderr().write_all(buf)),
      None => io::stderr().write_all(buf),
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    io::stderr().flush()
  }
}

/// Bookkeeping for one in-flight transfer.
#[derive(Debug)]
pub struct DownloadTask<'a> {
  pub source_url: &'a str,
  pub destination: &'a Path,
  pub expected: Option<u64>,
  pub received: u64,
}

impl<'a> DownloadTask<'a> {
  fn advance(&mut self, chunk: u64) {
    self.received = self.received.saturating_add(chunk);
  }
}

fn expected_length(headers: &HeaderMap) -> Option<u64> {
  headers
    .get(CONTENT_LENGTH)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Streams `url` into a fresh file at `destination` and returns the byte count.
/// A partial file is left behind on failure.
pub async fn download_to(
  client: &Client,
  url: &str,
  destination: &Path,
  observer: &dyn ProgressObserver,
) -> Result<u64, DownloadError> {
  let response = client
    .get(url)
    .send()
    .await
    .map_err(|source| DownloadError::Request {
      url: url.to_string(),
      source,
    })?;
  if !response.status().is_success() {
    return Err(DownloadError::Status {
      url: url.to_string(),
      status: response.status(),
    });
  }

  let mut task = DownloadTask {
    source_url: url,
    destination,
    expected: expected_length(response.headers()),
    received: 0,
  };
  let io_error = |source: io::Error| DownloadError::Io {
    path: destination.to_path_buf(),
    source,
  };

  let mut file = tokio::fs::File::create(destination).await.map_err(io_error)?;
  observer.on_start(task.expected);

  let mut stream = response.bytes_stream();
  while let Some(chunk) = stream.next().await {
    let chunk = match chunk {
      Ok(chunk) => chunk,
      Err(source) => {
        observer.on_abandon();
        return Err(DownloadError::Transfer {
          url: task.source_url.to_string(),
          received: task.received,
          source,
        });
      }
    };
    if let Err(err) = file.write_all(&chunk).await {
      observer.on_abandon();
      return Err(io_error(err));
    }
    task.advance(chunk.len() as u64);
    observer.on_chunk(chunk.len() as u64, task.received, task.expected);
  }

  file.flush().await.map_err(io_error)?;
  file.sync_all().await.map_err(io_error)?;

  if let Some(expected) = task.expected {
    if task.received < expected {
      observer.on_abandon();
      return Err(DownloadError::Incomplete {
        path: task.destination.to_path_buf(),
        expected,
        received: task.received,
      });
    }
  }

  observer.on_finish(task.received);
  Ok(task.received)
}

/// HTTP stream acquirer backed by the shared client.
pub struct StreamAcquirer {
  client: Client,
  progress: ProgressReporter,
}

impl StreamAcquirer {
  pub fn new(client: Client, progress: ProgressReporter) -> Self {
    Self { client, progress }
  }
}

#[async_trait]
impl StreamFetcher for StreamAcquirer {
  async fn fetch(
    &self,
    label: &str,
    url: &str,
    destination: &Path,
  ) -> Result<PathBuf, DownloadError> {
    info!("download_start kind={} path={}", label, destination.display());
    let observer = self.progress.observer(label);
    match download_to(&self.client, url, destination, observer.as_ref()).await {
      Ok(bytes) => {
        info!(
          "download_done kind={} path={} bytes={} size={}",
          label,
          destination.display(),
          bytes,
          format_bytes(bytes)
        );
        Ok(destination.to_path_buf())
      }
      Err(err) => {
        warn!("download_failed kind={} path={} err={}", label, destination.display(), err);
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{http_response, serve_once};
  use indicatif::ProgressDrawTarget;
  use reqwest::header::HeaderValue;
  use std::sync::Mutex;

  #[derive(Default)]
  struct RecordingObserver {
    started: Mutex<Option<Option<u64>>>,
    chunks: Mutex<Vec<(u64, u64, Option<u64>)>>,
    finished: Mutex<Option<u64>>,
    abandoned: Mutex<bool>,
  }

  impl ProgressObserver for RecordingObserver {
    fn on_start(&self, expected: Option<u64>) {
      *self.started.lock().unwrap() = Some(expected);
    }

    fn on_chunk(&self, chunk: u64, received: u64, expected: Option<u64>) {
      self.chunks.lock().unwrap().push((chunk, received, expected));
    }

    fn on_finish(&self, received: u64) {
      *self.finished.lock().unwrap() = Some(received);
    }

    fn on_abandon(&self) {
      *self.abandoned.lock().unwrap() = true;
    }
  }

  #[tokio::test]
  async fn full_body_matching_content_length_completes() {
    let body = vec![7u8; 1_000_000];
    let response = http_response("200 OK", &[("Content-Length", "1000000".to_string())], &body);
    let (base_url, _request) = serve_once(response).await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("123456_720P_video.m4v");
    let observer = RecordingObserver::default();

    let url = format!("{}/v.m4s", base_url);
    let bytes = download_to(&Client::new(), &url, &destination, &observer)
      .await
      .unwrap();

    assert_eq!(bytes, 1_000_000);
    assert_eq!(std::fs::metadata(&destination).unwrap().len(), 1_000_000);
    assert_eq!(*observer.started.lock().unwrap(), Some(Some(1_000_000)));
    assert_eq!(*observer.finished.lock().unwrap(), Some(1_000_000));

    let chunks = observer.chunks.lock().unwrap();
    let mut previous = 0;
    for (chunk, received, expected) in chunks.iter() {
      assert_eq!(*received, previous + chunk);
      assert_eq!(*expected, Some(1_000_000));
      previous = *received;
    }
    assert_eq!(previous, 1_000_000);
  }

  #[tokio::test]
  async fn premature_close_is_a_download_error() {
    let response = http_response("200 OK", &[("Content-Length", "1000".to_string())], &[1u8; 400]);
    let (base_url, _request) = serve_once(response).await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("audio.mp4");
    let observer = RecordingObserver::default();

    let url = format!("{}/a.m4s", base_url);
    let result = download_to(&Client::new(), &url, &destination, &observer).await;

    match &result {
      Err(DownloadError::Transfer { url: failed, .. }) => assert_eq!(failed, &url),
      Err(DownloadError::Incomplete { .. }) => {}
      other => panic!("unexpected result: {:?}", other),
    }
    assert!(*observer.abandoned.lock().unwrap());
    assert!(observer.finished.lock().unwrap().is_none());
    assert!(destination.exists());
  }

  #[tokio::test]
  async fn missing_content_length_degrades_to_counter() {
    let response = http_response("200 OK", &[], b"no length header here");
    let (base_url, _request) = serve_once(response).await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.bin");
    let observer = RecordingObserver::default();

    let bytes = download_to(&Client::new(), &base_url, &destination, &observer).await.unwrap();

    assert_eq!(bytes, 21);
    assert_eq!(*observer.started.lock().unwrap(), Some(None));
    assert!(observer.chunks.lock().unwrap().iter().all(|(_, _, expected)| expected.is_none()));
  }

  #[test]
  fn unparsable_content_length_is_treated_as_unknown() {
    let mut headers = HeaderMap::new();
    assert_eq!(expected_length(&headers), None);
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("abc"));
    assert_eq!(expected_length(&headers), None);
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1000000"));
    assert_eq!(expected_length(&headers), Some(1_000_000));
  }

  #[tokio::test]
  async fn error_status_is_reported() {
    let response = http_response("403 Forbidden", &[("Content-Length", "0".to_string())], b"");
    let (base_url, _request) = serve_once(response).await;
    let dir = tempfile::tempdir().unwrap();

    let destination = dir.path().join("x");
    let result = download_to(&Client::new(), &base_url, &destination, &SilentProgress).await;
    match result {
      Err(DownloadError::Status { status, .. }) => assert_eq!(status, StatusCode::FORBIDDEN),
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[tokio::test]
  async fn existing_file_is_overwritten() {
    let response = http_response("200 OK", &[("Content-Length", "3".to_string())], b"new");
    let (base_url, _request) = serve_once(response).await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("video.m4v");
    std::fs::write(&destination, b"much older and longer content").unwrap();

    download_to(&Client::new(), &base_url, &destination, &SilentProgress).await.unwrap();
    assert_eq!(std::fs::read(&destination).unwrap(), b"new");
  }

  #[tokio::test]
  async fn acquirer_returns_destination_path() {
    let response = http_response("200 OK", &[("Content-Length", "4".to_string())], b"data");
    let (base_url, _request) = serve_once(response).await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("video.m4v");

    let acquirer = StreamAcquirer::new(Client::new(), ProgressReporter::Silent);
    let path = acquirer.fetch("video", &base_url, &destination).await.unwrap();
    assert_eq!(path, destination);
  }

  #[test]
  fn log_writer_keeps_bars_intact() {
    let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
    let reporter = ProgressReporter::Terminal(multi.clone());
    let observer = BarProgress {
      multi,
      label: "video".to_string(),
      bar: OnceLock::new(),
    };
    observer.on_start(Some(10));
    observer.on_chunk(4, 4, Some(10));

    let mut writer = reporter.log_writer();
    writer.write_all(b"").unwrap();
    writer.flush().unwrap();

    observer.on_chunk(6, 10, Some(10));
    observer.on_finish(10);
    let bar = observer.bar().unwrap();
    assert_eq!(bar.position(), 10);
    assert!(bar.is_finished());
    ProgressReporter::Silent.log_writer().write_all(b"").unwrap();
  }
}
