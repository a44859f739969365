use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::bilibili::playurl::{parse_playurl, ResolveError};
use crate::models::{MediaId, MediaKind, ResolvedMedia};
use crate::traits::MetadataSource;

pub const PLAYURL_PATH: &str = "/intl/gateway/web/playurl";

pub struct BilibiliClient {
  client: Client,
  base_url: String,
}

impl BilibiliClient {
  /// `client` should come from `ClientConfig::build_client` so the referer and
  /// cookie headers are already attached.
  pub fn new(client: Client, base_url: impl Into<String>) -> Self {
    Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
    }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn playurl_url(&self, id: &MediaId) -> String {
    format!("{}{}?{}", self.base_url, PLAYURL_PATH, build_query(&playurl_params(id)))
  }

  pub async fn fetch_playurl(&self, id: &MediaId) -> Result<ResolvedMedia, ResolveError> {
    let url = self.playurl_url(id);
    info!("playurl_request id={} kind={:?}", id, id.kind());
    debug!("playurl_request url={}", url);

    let body = self
      .client
      .get(&url)
      .send()
      .await?
      .error_for_status()?
      .text()
      .await?;

    let media = parse_playurl(&body)?;
    info!(
      "playurl_done id={} variants={} audio=1",
      id,
      media.variants.len()
    );
    Ok(media)
  }
}

#[async_trait]
impl MetadataSource for BilibiliClient {
  async fn resolve(&self, id: &MediaId) -> Result<ResolvedMedia, ResolveError> {
    self.fetch_playurl(id).await
  }
}

/// Query parameters for the playurl endpoint. Episodes are pinned to qn=64,
/// assets ask for qn=120.
pub fn playurl_params(id: &MediaId) -> Vec<(String, String)> {
  let pairs: Vec<(&str, &str)> = match id.kind() {
    MediaKind::Episode => vec![
      ("ep_id", id.as_str()),
      ("device", "wap"),
      ("platform", "web"),
      ("qn", "64"),
      ("tf", "0"),
      ("type", "0"),
    ],
    MediaKind::Asset => vec![
      ("s_locale", "en_US"),
      ("platform", "web"),
      ("aid", id.as_str()),
      ("qn", "120"),
    ],
  };
  pairs
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

fn build_query(params: &[(String, String)]) -> String {
  let mut serializer = url::form_urlencoded::Serializer::new(String::new());
  for (key, value) in params {
    serializer.append_pair(key, value);
  }
  serializer.finish()
}
