use std::{collections::BTreeMap, fmt, time::Duration};

pub const DEFAULT_TITLE: &str = "audio";

// filename caps, counted in characters before ".mp3" is appended
pub const API_FILENAME_CHARS: usize = 50;
pub const UI_FILENAME_CHARS: usize = 30;

/// A resolved, directly fetchable audio resource.
///
/// `url` is short-lived and bound to the extractor's session, so it is kept
/// out of `Debug` output and never logged.
#[derive(Clone, PartialEq)]
pub struct MediaDescriptor {
  pub url: String,
  pub title: String,
  pub duration: Option<Duration>,
  pub headers: BTreeMap<String, String>,
}

impl MediaDescriptor {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      title: DEFAULT_TITLE.to_owned(),
      duration: None,
      headers: BTreeMap::new(),
    }
  }

  pub fn title(self, title: Option<String>) -> Self {
    let title = title
      .filter(|t| !t.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    Self { title, ..self }
  }

  // zero, negative and NaN durations all mean "unknown"
  pub fn duration_secs(self, secs: Option<f64>) -> Self {
    let duration = secs
      .filter(|s| s.is_finite() && *s > 0.0)
      .map(Duration::from_secs_f64);
    Self { duration, ..self }
  }

  pub fn headers(
    self,
    headers: impl IntoIterator<Item = (String, String)>,
  ) -> Self {
    Self {
      headers: headers.into_iter().collect(),
      ..self
    }
  }

  pub fn filename(&self, max_chars: usize) -> String {
    mp3_filename(&self.title, max_chars)
  }
}

impl fmt::Debug for MediaDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MediaDescriptor")
      .field("url", &"<redacted>")
      .field("title", &self.title)
      .field("duration", &self.duration)
      .field("headers", &self.headers.keys().collect::<Vec<_>>())
      .finish()
  }
}

/// Truncates the title to `max_chars` characters and makes it safe to use
/// as a filename component and inside a quoted header parameter.
pub fn sanitize_title(title: &str, max_chars: usize) -> String {
  let sanitized: String = title
    .chars()
    .take(max_chars)
    .filter(|c| *c != '"' && !c.is_control())
    .map(|c| match c {
      '/' | '\\' => '-',
      c => c,
    })
    .collect();

  let sanitized = sanitized.trim();
  if sanitized.is_empty() {
    DEFAULT_TITLE.to_owned()
  } else {
    sanitized.to_owned()
  }
}

pub fn mp3_filename(title: &str, max_chars: usize) -> String {
  format!("{}.mp3", sanitize_title(title, max_chars))
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let hours = secs / 3600;
  let minutes = (secs % 3600) / 60;
  let seconds = secs % 60;

  if hours > 0 {
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
  } else {
    format!("{}:{:02}", minutes, seconds)
  }
}
