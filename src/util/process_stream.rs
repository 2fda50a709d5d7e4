use std::process::Stdio;

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::io::ReaderStream;

use crate::{Error, Result};

pub const CHUNK_SIZE: usize = 4096;

enum State {
  Reading {
    child: Child,
    chunks: ReaderStream<ChildStdout>,
  },
  Done,
}

/// Spawns `cmd` and relays its stdout in chunks of at most `CHUNK_SIZE`
/// bytes. stderr is discarded.
///
/// The child is owned by the stream. After stdout hits EOF the child is
/// waited on, and a non-zero exit status is yielded as a final
/// `Error::Transcode`. Dropping the stream early kills the child.
pub fn process_stream(
  mut cmd: Command,
) -> Result<BoxStream<'static, Result<Bytes>>> {
  let mut child = cmd
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .kill_on_drop(true)
    .spawn()?;

  let stdout = child
    .stdout
    .take()
    .ok_or_else(|| Error::Server("child stdout not captured".into()))?;
  let chunks = ReaderStream::with_capacity(stdout, CHUNK_SIZE);

  Ok(futures::stream::unfold(State::Reading { child, chunks }, next).boxed())
}

async fn next(state: State) -> Option<(Result<Bytes>, State)> {
  let State::Reading {
    mut child,
    mut chunks,
  } = state
  else {
    return None;
  };

  match chunks.next().await {
    Some(Ok(bytes)) => Some((Ok(bytes), State::Reading { child, chunks })),
    // child is dropped here, which kills it
    Some(Err(e)) => Some((Err(e.into()), State::Done)),
    None => {
      drop(chunks);
      match child.wait().await {
        Ok(status) if status.success() => None,
        Ok(status) => Some((Err(Error::Transcode(status)), State::Done)),
        Err(e) => Some((Err(e.into()), State::Done)),
      }
    }
  }
}
