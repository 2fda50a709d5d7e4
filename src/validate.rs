use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

// Anchored at the start only. The id must be exactly 11 characters, so it
// is followed by either the end of input or a non-id character; trailing
// query parameters such as `&t=42s` or `?si=...` are accepted.
static VIDEO_URL_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
  [
    Regex::new(
      r"^https?://(?:www\.)?youtube\.com/watch\?v=([\w-]{11})(?:$|[^\w-])",
    )
    .unwrap(),
    Regex::new(r"^https?://youtu\.be/([\w-]{11})(?:$|[^\w-])").unwrap(),
  ]
});

pub fn is_valid_video_url(url: &str) -> bool {
  video_id(url).is_some()
}

pub fn video_id(url: &str) -> Option<&str> {
  VIDEO_URL_PATTERNS
    .iter()
    .find_map(|re| re.captures(url))
    .and_then(|caps| caps.get(1))
    .map(|m| m.as_str())
}

/// Fail fast on anything that doesn't look like a video link. No network
/// access happens here, and a match doesn't mean the video exists.
pub fn check_video_url(url: Option<&str>) -> Result<&str> {
  match url {
    None | Some("") => Err(Error::MissingUrl),
    Some(url) if is_valid_video_url(url) => Ok(url),
    Some(url) => Err(Error::InvalidUrl(url.to_owned())),
  }
}
