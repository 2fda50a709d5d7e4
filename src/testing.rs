// stand-ins for yt-dlp and ffmpeg used across the test modules

use std::{
  process::ExitStatus,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::{
  extractor::Extractor,
  media::MediaDescriptor,
  transcoder::{Mp3Stream, Transcoder},
  util::CHUNK_SIZE,
  Error, Result,
};

pub fn test_song() -> MediaDescriptor {
  MediaDescriptor::new("https://cdn.example/audio.m4a")
    .title(Some("Test Song".into()))
    .duration_secs(Some(213.0))
}

pub struct StubExtractor {
  result: std::result::Result<MediaDescriptor, String>,
  calls: Arc<AtomicUsize>,
}

impl StubExtractor {
  pub fn ok(media: MediaDescriptor) -> Self {
    Self {
      result: Ok(media),
      calls: Default::default(),
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      result: Err(message.to_owned()),
      calls: Default::default(),
    }
  }

  pub fn calls(&self) -> Arc<AtomicUsize> {
    self.calls.clone()
  }
}

#[async_trait]
impl Extractor for StubExtractor {
  async fn resolve(&self, _url: &str) -> Result<MediaDescriptor> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.result.clone().map_err(Error::Extraction)
  }
}

/// Emits `chunks` full chunks, chunk `i` filled with byte `i`, then exits
/// with `exit_code`. Every item waits `delay` first, like a real transcoder
/// working through its input.
pub struct StubTranscoder {
  chunks: usize,
  exit_code: i32,
  delay: Duration,
}

impl StubTranscoder {
  pub fn ok(chunks: usize) -> Self {
    Self::failing_after(chunks, 0)
  }

  pub fn failing_after(chunks: usize, exit_code: i32) -> Self {
    Self {
      chunks,
      exit_code,
      delay: Duration::ZERO,
    }
  }

  pub fn with_delay(self, delay: Duration) -> Self {
    Self { delay, ..self }
  }
}

impl Transcoder for StubTranscoder {
  fn transcode(&self, _media: &MediaDescriptor) -> Result<Mp3Stream> {
    let mut items: Vec<Result<Bytes>> = (0..self.chunks)
      .map(|i| Ok(Bytes::from(vec![i as u8; CHUNK_SIZE])))
      .collect();

    if self.exit_code != 0 {
      items.push(Err(Error::Transcode(exit_status(self.exit_code))));
    }

    let delay = self.delay;
    let stream = futures::stream::iter(items).then(move |item| async move {
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      item
    });

    Ok(stream.boxed())
  }
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
  use std::os::unix::process::ExitStatusExt;
  ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
  use std::os::windows::process::ExitStatusExt;
  ExitStatus::from_raw(code as u32)
}
