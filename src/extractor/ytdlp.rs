use std::{collections::HashMap, process::Stdio};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{media::MediaDescriptor, Error, Result};

use super::Extractor;

// run yt-dlp command line to resolve the best audio format of a video.
// requires yt-dlp executable to be in PATH (or configured via YTDLP_PATH).
pub struct Ytdlp {
  program: String,
  proxy: Option<String>,
}

#[derive(Deserialize)]
struct YtdlpOutput {
  url: Option<String>,
  title: Option<String>,
  duration: Option<f64>,
  #[serde(default)]
  http_headers: Option<HashMap<String, String>>,
}

impl Ytdlp {
  pub fn new(program: impl Into<String>, proxy: Option<String>) -> Self {
    Self {
      program: program.into(),
      proxy,
    }
  }

  fn command(&self, url: &str) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd
      .arg("--dump-json")
      .arg("--quiet")
      .arg("--no-warnings")
      .arg("--no-playlist")
      .arg("-f")
      .arg("bestaudio/best");

    if let Some(proxy) = &self.proxy {
      debug!("using proxy: {}", redact_proxy(proxy));
      cmd.arg("--proxy").arg(proxy);
    }

    cmd
      .arg(url)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    cmd
  }
}

#[async_trait]
impl Extractor for Ytdlp {
  async fn resolve(&self, url: &str) -> Result<MediaDescriptor> {
    let output = self
      .command(url)
      .output()
      .await
      .map_err(|e| Error::Extraction(format!("failed to run yt-dlp: {e}")))?;

    if !output.status.success() {
      return Err(Error::Extraction(error_message(&output.stderr)));
    }

    parse_output(&output.stdout)
  }
}

fn parse_output(stdout: &[u8]) -> Result<MediaDescriptor> {
  let output: YtdlpOutput = serde_json::from_slice(stdout)
    .map_err(|e| Error::Extraction(format!("unexpected yt-dlp output: {e}")))?;

  let url = output
    .url
    .filter(|url| !url.is_empty())
    .ok_or_else(|| Error::Extraction("no audio format available".into()))?;

  Ok(
    MediaDescriptor::new(url)
      .title(output.title)
      .duration_secs(output.duration)
      .headers(output.http_headers.unwrap_or_default()),
  )
}

fn error_message(stderr: &[u8]) -> String {
  let stderr = String::from_utf8_lossy(stderr);
  let errors: Vec<_> = stderr
    .lines()
    .filter_map(|line| line.trim().strip_prefix("ERROR:"))
    .map(str::trim)
    .collect();

  match (errors.is_empty(), stderr.trim()) {
    (false, _) => errors.join("; "),
    (true, "") => "yt-dlp exited unsuccessfully".to_owned(),
    (true, other) => other.to_owned(),
  }
}

// used to remove cred info from proxy url before printing
fn redact_proxy(proxy: &str) -> std::borrow::Cow<'_, str> {
  static AUTH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//[^:/@]+(:[^@]+)?@").unwrap());
  AUTH_REGEX.replace(proxy, "//<REDACTED>@")
}
