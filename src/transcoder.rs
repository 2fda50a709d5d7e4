mod ffmpeg;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::{media::MediaDescriptor, Result};

pub use ffmpeg::Ffmpeg;

/// MP3 bytes as the transcoder produces them. A transcoder failure is the
/// last item of the stream.
pub type Mp3Stream = BoxStream<'static, Result<Bytes>>;

pub trait Transcoder: Send + Sync {
  fn transcode(&self, media: &MediaDescriptor) -> Result<Mp3Stream>;
}
