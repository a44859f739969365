use serde::Deserialize;
use thiserror::Error;

use crate::models::{QualityVariant, ResolvedMedia};

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("malformed playurl response: {0}")]
  MalformedResponse(String),
  #[error("incomplete media: {videos} usable video stream(s), audio {}", audio_state(.has_audio))]
  IncompleteMedia { videos: usize, has_audio: bool },
}

fn audio_state(has_audio: &bool) -> &'static str {
  if *has_audio {
    "present"
  } else {
    "missing"
  }
}

#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(default)]
  code: Option<i64>,
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  data: Option<Data>,
}

#[derive(Debug, Deserialize)]
struct Data {
  #[serde(default)]
  playurl: Option<PlayUrl>,
}

#[derive(Debug, Deserialize)]
struct PlayUrl {
  #[serde(default)]
  video: Option<Vec<VideoEntry>>,
  #[serde(default)]
  audio_resource: Option<Vec<AudioResource>>,
}

#[derive(Debug, Deserialize)]
struct VideoEntry {
  #[serde(default)]
  video_resource: Option<VideoResource>,
  #[serde(default)]
  stream_info: Option<StreamInfo>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StreamInfo {
  #[serde(default)]
  desc_words: Option<String>,
  #[serde(default)]
  quality: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AudioResource {
  #[serde(default)]
  url: Option<String>,
}

/// Decodes a playurl body into a catalog. Fails closed: either a non-empty
/// variant list and an audio URL, or an error.
pub fn parse_playurl(body: &str) -> Result<ResolvedMedia, ResolveError> {
  let envelope: Envelope = serde_json::from_str(body)
    .map_err(|err| ResolveError::MalformedResponse(format!("invalid JSON: {}", err)))?;

  let playurl = match envelope.data.and_then(|data| data.playurl) {
    Some(playurl) => playurl,
    None => {
      let detail = match (envelope.code, envelope.message) {
        (Some(code), Some(message)) if code != 0 => {
          format!("missing data.playurl ({} (code: {}))", message, code)
        }
        (Some(code), None) if code != 0 => format!("missing data.playurl (code: {})", code),
        _ => "missing data.playurl".to_string(),
      };
      return Err(ResolveError::MalformedResponse(detail));
    }
  };

  let variants: Vec<QualityVariant> = playurl
    .video
    .unwrap_or_default()
    .into_iter()
    .filter_map(|entry| {
      let resource = entry.video_resource?;
      let url = resource.url?;
      if url.trim().is_empty() {
        return None;
      }
      let (description, quality) = match entry.stream_info {
        Some(info) => (info.desc_words, info.quality),
        None => (None, None),
      };
      Some(QualityVariant {
        description: description
          .filter(|value| !value.trim().is_empty())
          .unwrap_or_else(|| "unknown".to_string()),
        stream_url: url,
        quality,
        size: resource.size.filter(|size| *size > 0),
      })
    })
    .collect();

  let audio_url = playurl
    .audio_resource
    .unwrap_or_default()
    .into_iter()
    .next()
    .and_then(|audio| audio.url)
    .filter(|url| !url.trim().is_empty());

  match audio_url {
    Some(audio_url) if !variants.is_empty() => Ok(ResolvedMedia { variants, audio_url }),
    audio_url => Err(ResolveError::IncompleteMedia {
      videos: variants.len(),
      has_audio: audio_url.is_some(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn keeps_server_order_and_skips_blank_urls() {
    let body = json!({
      "code": 0,
      "data": { "playurl": {
        "video": [
          {
            "video_resource": { "url": "u1", "size": 1000 },
            "stream_info": { "desc_words": "1080P", "quality": 80 }
          },
          { "video_resource": { "url": "   " }, "stream_info": { "desc_words": "720P" } },
          {
            "video_resource": { "url": "u3" },
            "stream_info": { "desc_words": "480P", "quality": 32 }
          }
        ],
        "audio_resource": [ { "url": "a1" }, { "url": "a2" } ]
      }}
    })
    .to_string();

    let media = parse_playurl(&body).unwrap();
    let descriptions: Vec<&str> = media.variants.iter().map(|v| v.description.as_str()).collect();
    assert_eq!(descriptions, ["1080P", "480P"]);
    assert_eq!(media.variants[0].stream_url, "u1");
    assert_eq!(media.variants[0].quality, Some(80));
    assert_eq!(media.variants[0].size, Some(1000));
    assert_eq!(media.audio_url, "a1");
  }

  #[test]
  fn empty_url_entry_is_excluded() {
    let body = json!({
      "data": { "playurl": {
        "video": [
          { "video_resource": { "url": "" }, "stream_info": { "desc_words": "4K" } },
          { "video_resource": { "url": "u2" }, "stream_info": { "desc_words": "720P" } }
        ],
        "audio_resource": [ { "url": "ua" } ]
      }}
    })
    .to_string();

    let media = parse_playurl(&body).unwrap();
    assert_eq!(media.variants, vec![QualityVariant::new("720P", "u2")]);
  }

  #[test]
  fn no_usable_video_is_incomplete_even_with_audio() {
    let body = json!({
      "data": { "playurl": {
        "video": [ { "video_resource": { "url": "" }, "stream_info": { "desc_words": "720P" } } ],
        "audio_resource": [ { "url": "ua" } ]
      }}
    })
    .to_string();

    match parse_playurl(&body) {
      Err(ResolveError::IncompleteMedia { videos, has_audio }) => {
        assert_eq!(videos, 0);
        assert!(has_audio);
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn missing_audio_is_incomplete() {
    let body = json!({
      "data": { "playurl": {
        "video": [ { "video_resource": { "url": "u1" }, "stream_info": { "desc_words": "720P" } } ],
        "audio_resource": []
      }}
    })
    .to_string();

    match parse_playurl(&body) {
      Err(ResolveError::IncompleteMedia { videos, has_audio }) => {
        assert_eq!(videos, 1);
        assert!(!has_audio);
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn missing_playurl_is_malformed() {
    let body = json!({ "code": 0, "data": {} }).to_string();
    assert!(matches!(parse_playurl(&body), Err(ResolveError::MalformedResponse(_))));

    let body = json!({ "code": 0 }).to_string();
    assert!(matches!(parse_playurl(&body), Err(ResolveError::MalformedResponse(_))));
  }

  #[test]
  fn api_error_message_is_kept() {
    let body = json!({ "code": -404, "message": "nothing here", "data": null }).to_string();
    match parse_playurl(&body) {
      Err(ResolveError::MalformedResponse(detail)) => {
        assert!(detail.contains("nothing here"), "{}", detail);
        assert!(detail.contains("-404"), "{}", detail);
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn non_json_body_is_malformed() {
    assert!(matches!(
      parse_playurl("<html>blocked</html>"),
      Err(ResolveError::MalformedResponse(_))
    ));
  }

  #[test]
  fn entry_without_stream_info_gets_placeholder_description() {
    let body = json!({
      "data": { "playurl": {
        "video": [
          { "video_resource": { "url": "u1" } },
          { "stream_info": { "desc_words": "360P" } }
        ],
        "audio_resource": [ { "url": "ua" } ]
      }}
    })
    .to_string();

    let media = parse_playurl(&body).unwrap();
    assert_eq!(media.variants.len(), 1);
    assert_eq!(media.variants[0].description, "unknown");
  }
}
