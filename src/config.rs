use std::{net::SocketAddr, time::Duration};

use crate::{Error, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
  pub bind_addr: SocketAddr,
  pub ytdlp_path: String,
  pub ffmpeg_path: String,
  pub ytdlp_proxy: Option<String>,
  pub shutdown_timeout: Duration,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let var = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());

    let bind_addr = var("BIND_ADDR")
      .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned())
      .parse::<SocketAddr>()
      .map_err(|e| Error::Config("BIND_ADDR", format!("{e}")))?;

    let shutdown_timeout = match var("SHUTDOWN_TIMEOUT_SECS") {
      None => Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
      Some(secs) => secs
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| Error::Config("SHUTDOWN_TIMEOUT_SECS", format!("{e}")))?,
    };

    Ok(Self {
      bind_addr,
      ytdlp_path: var("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_owned()),
      ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_owned()),
      ytdlp_proxy: var("YTDLP_PROXY"),
      shutdown_timeout,
    })
  }
}

#[cfg(test)]
mod test {
  use std::collections::HashMap;

  use super::*;

  fn config(vars: &[(&str, &str)]) -> Result<Config> {
    let vars: HashMap<_, _> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
  }

  #[test]
  fn test_defaults() {
    let config = config(&[]).unwrap();
    assert_eq!(config.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    assert_eq!(config.ytdlp_path, "yt-dlp");
    assert_eq!(config.ffmpeg_path, "ffmpeg");
    assert_eq!(config.ytdlp_proxy, None);
    assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
  }

  #[test]
  fn test_overrides() {
    let config = config(&[
      ("BIND_ADDR", "127.0.0.1:3000"),
      ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
      ("YTDLP_PROXY", "socks5://127.0.0.1:1080"),
      ("SHUTDOWN_TIMEOUT_SECS", "1"),
    ])
    .unwrap();
    assert_eq!(config.bind_addr.port(), 3000);
    assert_eq!(config.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(config.ytdlp_proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
    assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
  }

  #[test]
  fn test_empty_values_are_unset() {
    let config = config(&[("YTDLP_PROXY", ""), ("YTDLP_PATH", " ")]).unwrap();
    assert_eq!(config.ytdlp_proxy, None);
    assert_eq!(config.ytdlp_path, "yt-dlp");
  }

  #[test]
  fn test_invalid_values() {
    assert!(matches!(
      config(&[("BIND_ADDR", "localhost")]),
      Err(Error::Config("BIND_ADDR", _))
    ));
    assert!(matches!(
      config(&[("SHUTDOWN_TIMEOUT_SECS", "soon")]),
      Err(Error::Config("SHUTDOWN_TIMEOUT_SECS", _))
    ));
  }
}
