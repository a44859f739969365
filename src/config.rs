use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT};
use reqwest::Client;
use tracing::warn;

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
pub const DEFAULT_API_BASE_URL: &str = "https://api.bilibili.tv";
pub const DEFAULT_REFERER: &str = "https://www.bilibili.tv/";
pub const DEFAULT_COOKIE_FILE: &str = "cookies.txt";
pub const DEFAULT_DOWNLOAD_DIR: &str = "Downloads";
pub const DEFAULT_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

pub fn default_download_dir() -> PathBuf {
  PathBuf::from(DEFAULT_DOWNLOAD_DIR)
}

/// HTTP settings shared by the metadata client and the stream acquirer.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub api_base_url: String,
  pub referer: String,
  pub cookie: String,
  pub user_agent: String,
  pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      api_base_url: DEFAULT_API_BASE_URL.to_string(),
      referer: DEFAULT_REFERER.to_string(),
      cookie: String::new(),
      user_agent: DEFAULT_USER_AGENT.to_string(),
      connect_timeout: None,
    }
  }
}

impl ClientConfig {
  pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
    self.cookie = cookie.into();
    self
  }

  pub fn default_headers(&self) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
      headers.insert(USER_AGENT, value);
    }
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));
    match HeaderValue::from_str(&self.referer) {
      Ok(value) => {
        headers.insert(REFERER, value);
      }
      Err(_) => warn!("config_referer_invalid referer={}", self.referer),
    }
    if !self.cookie.is_empty() {
      match HeaderValue::from_str(&self.cookie) {
        Ok(value) => {
          headers.insert(COOKIE, value);
        }
        Err(_) => warn!("config_cookie_invalid len={} sending without cookie", self.cookie.len()),
      }
    }
    headers
  }

  /// Builds the one client used for the whole run.
  pub fn build_client(&self) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder().default_headers(self.default_headers());
    if let Some(timeout) = self.connect_timeout {
      builder = builder.connect_timeout(timeout);
    }
    builder.build()
  }
}
