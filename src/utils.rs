use std::fs;
use std::io;
use std::path::Path;

pub fn sanitize_filename(name: &str) -> String {
  let mut sanitized = String::with_capacity(name.len());
  for ch in name.trim().chars() {
    let is_invalid = matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|');
    sanitized.push(if is_invalid { '_' } else { ch });
  }
  if sanitized.is_empty() {
    sanitized.push_str("unknown");
  }
  sanitized
}

pub fn ensure_dir(dir: &Path) -> io::Result<()> {
  if dir.is_dir() {
    return Ok(());
  }
  fs::create_dir_all(dir)
}

pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} {}", bytes, UNITS[0])
  } else {
    format!("{:.1} {}", value, UNITS[unit])
  }
}
