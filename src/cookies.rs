use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Joins the non-empty lines of a cookie file into one `Cookie` header value.
pub fn join_cookie_lines(content: &str) -> String {
  content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .collect::<Vec<_>>()
    .join("; ")
}

/// Reads the session cookies. A missing or unreadable file yields an empty
/// string and the run continues anonymously.
pub fn load_cookie_header(path: &Path) -> String {
  match fs::read_to_string(path) {
    Ok(content) => {
      let header = join_cookie_lines(&content);
      info!(
        "cookies_loaded path={} entries={}",
        path.display(),
        header.split("; ").filter(|part| !part.is_empty()).count()
      );
      header
    }
    Err(err) => {
      warn!("cookies_missing path={} err={}", path.display(), err);
      String::new()
    }
  }
}
