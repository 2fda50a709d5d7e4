use tokio::process::Command;

use crate::{media::MediaDescriptor, util::process_stream, Result};

use super::{Mp3Stream, Transcoder};

// 0-9, 0 is best
const MP3_QUALITY: &str = "2";

// run ffmpeg to transcode the remote audio into mp3 on stdout.
// nothing is written to disk.
pub struct Ffmpeg {
  program: String,
}

impl Ffmpeg {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  pub fn args(media: &MediaDescriptor) -> Vec<String> {
    let mut args = Vec::with_capacity(media.headers.len() * 2 + 9);

    for (name, value) in &media.headers {
      args.push("-headers".to_owned());
      args.push(format!("{name}: {value}"));
    }

    args.extend(
      [
        "-i",
        media.url.as_str(),
        "-f",
        "mp3",
        "-acodec",
        "libmp3lame",
        "-q:a",
        MP3_QUALITY,
        "-",
      ]
      .map(String::from),
    );

    args
  }
}

impl Transcoder for Ffmpeg {
  fn transcode(&self, media: &MediaDescriptor) -> Result<Mp3Stream> {
    let mut cmd = Command::new(&self.program);
    cmd.args(Self::args(media));
    process_stream(cmd)
  }
}
