use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::{
  extractor::Extractor,
  media::MediaDescriptor,
  transcoder::{Mp3Stream, Transcoder},
  validate::{check_video_url, video_id},
  Result,
};

// progress stays below this until the transcoder actually exits
const MAX_ESTIMATE: f64 = 0.99;

/// The validate -> extract -> transcode pipeline. Cheap to clone; every
/// request runs its own extraction and its own transcoder process.
#[derive(Clone)]
pub struct Converter {
  extractor: Arc<dyn Extractor>,
  transcoder: Arc<dyn Transcoder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mp3Artifact {
  pub filename: String,
  pub bytes: Bytes,
}

impl Converter {
  pub fn new(
    extractor: impl Extractor + 'static,
    transcoder: impl Transcoder + 'static,
  ) -> Self {
    Self {
      extractor: Arc::new(extractor),
      transcoder: Arc::new(transcoder),
    }
  }

  /// Validates the url and resolves it. Invalid input never reaches the
  /// extractor.
  pub async fn prepare(&self, url: Option<&str>) -> Result<MediaDescriptor> {
    let url = check_video_url(url)?;
    let id = video_id(url).unwrap_or_default();

    debug!(video_id = id, "resolving audio");
    let media = self.extractor.resolve(url).await.map_err(|e| {
      warn!(video_id = id, "extraction failed: {}", e);
      e
    })?;
    info!(video_id = id, title = %media.title, "resolved audio");

    Ok(media)
  }

  /// Starts the transcoder and relays its output as it is produced.
  ///
  /// The first chunk is awaited before returning, so a transcoder that
  /// fails without producing anything is reported as an error instead of an
  /// empty stream. Later failures end the stream with an error item.
  pub async fn stream(&self, media: &MediaDescriptor) -> Result<Mp3Stream> {
    let mut stream = self.transcoder.transcode(media)?;

    let first = match stream.next().await {
      Some(chunk) => chunk?,
      None => return Ok(futures::stream::empty().boxed()),
    };

    let title = media.title.clone();
    let stream = futures::stream::once(async { Ok(first) })
      .chain(stream)
      .inspect_err(move |e| warn!(title = %title, "conversion failed: {}", e))
      .boxed();

    Ok(stream)
  }

  /// Runs the transcoder to completion and buffers the whole output.
  ///
  /// Nothing is returned unless the transcoder exits successfully, so a
  /// truncated file is never handed out. `on_progress` receives time based
  /// estimates and only fires when the duration is known.
  pub async fn collect(
    &self,
    media: &MediaDescriptor,
    max_filename_chars: usize,
    mut on_progress: impl FnMut(f64) + Send,
  ) -> Result<Mp3Artifact> {
    let progress = Progress::start(media.duration);
    let mut stream = self.transcoder.transcode(media)?;
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
      buf.extend_from_slice(&chunk?);

      if let Some(fraction) = progress.fraction() {
        on_progress(fraction);
      }
    }

    if let Some(fraction) = progress.finish() {
      on_progress(fraction);
    }

    info!(title = %media.title, bytes = buf.len(), "conversion complete");

    Ok(Mp3Artifact {
      filename: media.filename(max_filename_chars),
      bytes: buf.freeze(),
    })
  }
}

/// Best-effort completion estimate from wall-clock time. The output size is
/// unknown in advance, so bytes produced can't be used.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
  started: Instant,
  duration: Option<Duration>,
}

impl Progress {
  pub fn start(duration: Option<Duration>) -> Self {
    Self {
      started: Instant::now(),
      duration: duration.filter(|d| !d.is_zero()),
    }
  }

  pub fn fraction(&self) -> Option<f64> {
    self.fraction_at(self.started.elapsed())
  }

  pub fn fraction_at(&self, elapsed: Duration) -> Option<f64> {
    let duration = self.duration?;
    let fraction = elapsed.as_secs_f64() / duration.as_secs_f64();
    Some(fraction.min(MAX_ESTIMATE))
  }

  pub fn finish(&self) -> Option<f64> {
    self.duration.map(|_| 1.0)
  }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::Ordering;

  use super::*;
  use crate::{
    media::{API_FILENAME_CHARS, UI_FILENAME_CHARS},
    testing::{test_song, StubExtractor, StubTranscoder},
    util::CHUNK_SIZE,
    Error,
  };

  #[tokio::test]
  async fn test_invalid_url_never_reaches_extractor() {
    let extractor = StubExtractor::ok(test_song());
    let calls = extractor.calls();
    let converter = Converter::new(extractor, StubTranscoder::ok(1));

    for url in [None, Some(""), Some("https://example.com/watch?v=x")] {
      assert!(converter.prepare(url).await.is_err());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let url = Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert!(converter.prepare(url).await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_extraction_failure_surfaces() {
    let converter = Converter::new(
      StubExtractor::failing("Video unavailable"),
      StubTranscoder::ok(1),
    );
    let res = converter.prepare(Some("https://youtu.be/dQw4w9WgXcQ")).await;

    match res {
      Err(Error::Extraction(msg)) => assert_eq!(msg, "Video unavailable"),
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_collect_end_to_end() {
    let converter =
      Converter::new(StubExtractor::ok(test_song()), StubTranscoder::ok(10));
    let media = converter
      .prepare(Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
      .await
      .unwrap();

    let artifact = converter
      .collect(&media, UI_FILENAME_CHARS, |_| ())
      .await
      .unwrap();

    assert_eq!(artifact.filename, "Test Song.mp3");
    assert_eq!(artifact.bytes.len(), 40960);

    // chunk i is filled with byte i, so order and boundaries are intact
    for (i, chunk) in artifact.bytes.chunks(CHUNK_SIZE).enumerate() {
      assert!(chunk.iter().all(|b| *b == i as u8));
    }
  }

  #[tokio::test]
  async fn test_collect_withholds_failed_conversion() {
    let converter = Converter::new(
      StubExtractor::ok(test_song()),
      StubTranscoder::failing_after(3, 1),
    );

    let res = converter.collect(&test_song(), API_FILENAME_CHARS, |_| ()).await;
    assert!(matches!(res, Err(Error::Transcode(_))));
  }

  #[tokio::test]
  async fn test_collect_reports_progress() {
    let converter =
      Converter::new(StubExtractor::ok(test_song()), StubTranscoder::ok(5));

    let mut reports = vec![];
    converter
      .collect(&test_song(), UI_FILENAME_CHARS, |f| reports.push(f))
      .await
      .unwrap();

    assert_eq!(reports.len(), 6);
    assert!(reports[..5].iter().all(|f| (0.0..=MAX_ESTIMATE).contains(f)));
    assert_eq!(reports[5], 1.0);
  }

  #[tokio::test]
  async fn test_collect_without_duration_reports_nothing() {
    let media = MediaDescriptor::new("https://cdn.example/audio.m4a")
      .duration_secs(Some(0.0));
    let converter =
      Converter::new(StubExtractor::ok(media.clone()), StubTranscoder::ok(5));

    let mut reports = vec![];
    let artifact = converter
      .collect(&media, UI_FILENAME_CHARS, |f| reports.push(f))
      .await
      .unwrap();

    assert!(reports.is_empty());
    assert_eq!(artifact.filename, "audio.mp3");
  }

  #[tokio::test]
  async fn test_stream_relays_every_chunk() {
    let converter =
      Converter::new(StubExtractor::ok(test_song()), StubTranscoder::ok(10));

    let chunks: Vec<_> = converter
      .stream(&test_song())
      .await
      .unwrap()
      .try_collect()
      .await
      .unwrap();

    assert_eq!(chunks.len(), 10);
    assert_eq!(chunks.iter().map(Bytes::len).sum::<usize>(), 40960);
  }

  #[tokio::test]
  async fn test_stream_fails_before_first_chunk() {
    let converter = Converter::new(
      StubExtractor::ok(test_song()),
      StubTranscoder::failing_after(0, 1),
    );

    let res = converter.stream(&test_song()).await;
    assert!(matches!(res, Err(Error::Transcode(_))));
  }

  #[tokio::test]
  async fn test_stream_ends_with_error_after_partial_output() {
    let converter = Converter::new(
      StubExtractor::ok(test_song()),
      StubTranscoder::failing_after(2, 1),
    );

    let items: Vec<_> =
      converter.stream(&test_song()).await.unwrap().collect().await;

    assert_eq!(items.len(), 3);
    assert!(items[..2].iter().all(Result::is_ok));
    assert!(matches!(items[2], Err(Error::Transcode(_))));
  }

  #[test]
  fn test_progress_estimate() {
    let progress = Progress::start(Some(Duration::from_secs(200)));
    assert_eq!(progress.fraction_at(Duration::ZERO), Some(0.0));
    assert_eq!(progress.fraction_at(Duration::from_secs(50)), Some(0.25));
    assert_eq!(
      progress.fraction_at(Duration::from_secs(1000)),
      Some(MAX_ESTIMATE)
    );
    assert_eq!(progress.finish(), Some(1.0));
  }

  #[test]
  fn test_progress_unknown_duration_is_inert() {
    for duration in [None, Some(Duration::ZERO)] {
      let progress = Progress::start(duration);
      assert_eq!(progress.fraction_at(Duration::from_secs(10)), None);
      assert_eq!(progress.fraction(), None);
      assert_eq!(progress.finish(), None);
    }
  }
}
