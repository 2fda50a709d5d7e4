use std::{
  convert::Infallible,
  net::{SocketAddr, TcpListener},
  time::Duration,
};

use axum::{
  body::{Full, StreamBody},
  extract::{FromRef, Query, State},
  http::{header, HeaderValue, Response, StatusCode},
  response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse,
  },
  routing::get,
  Router,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
  convert::Converter,
  media::{API_FILENAME_CHARS, UI_FILENAME_CHARS},
  progress::{check_token, ProgressBoard},
  ui, Error, Result,
};

const AUDIO_MPEG: &str = "audio/mpeg";

// how long a progress watcher waits for the next report
const PROGRESS_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, FromRef)]
pub struct AppState {
  pub converter: Converter,
  pub progress: ProgressBoard,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertReq {
  pub url: Option<String>,
  // lets a /progress watcher follow this download
  pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressReq {
  pub token: Option<String>,
}

pub fn router(converter: Converter) -> Router {
  let state = AppState {
    converter,
    progress: ProgressBoard::new(PROGRESS_IDLE_TIMEOUT),
  };

  Router::new()
    .route("/", get(ui::homepage))
    .route("/ui", get(ui::convert_page))
    .route("/health", get(health))
    .route("/convert", get(convert))
    .route("/download", get(download))
    .route("/progress", get(progress))
    .with_state(state)
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}

// streams the mp3 as the transcoder produces it
async fn convert(
  State(converter): State<Converter>,
  Query(req): Query<ConvertReq>,
) -> Result<impl IntoResponse> {
  let media = converter.prepare(req.url.as_deref()).await?;
  let stream = converter.stream(&media).await?;
  let filename = media.filename(API_FILENAME_CHARS);

  let resp = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, AUDIO_MPEG)
    .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
    .header(header::CACHE_CONTROL, "no-store")
    .body(StreamBody::new(stream))?;

  Ok(resp)
}

// buffers the complete mp3 before responding, backing the UI's download link
async fn download(
  State(converter): State<Converter>,
  State(board): State<ProgressBoard>,
  Query(req): Query<ConvertReq>,
) -> Result<impl IntoResponse> {
  let publisher = match req.token.as_deref() {
    Some(token) => Some(board.publish(check_token(Some(token))?)),
    None => None,
  };
  let media = converter.prepare(req.url.as_deref()).await?;

  let mut last_decile = 0;
  let title = media.title.clone();
  let artifact = converter
    .collect(&media, UI_FILENAME_CHARS, |fraction| {
      if let Some(publisher) = &publisher {
        publisher.report(fraction);
      }
      let decile = (fraction * 10.0) as u32;
      if decile > last_decile {
        last_decile = decile;
        debug!(title = %title, "converting: {:.0}%", fraction * 100.0);
      }
    })
    .await?;

  let resp = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, AUDIO_MPEG)
    .header(header::CONTENT_LENGTH, artifact.bytes.len())
    .header(
      header::CONTENT_DISPOSITION,
      content_disposition(&artifact.filename),
    )
    .header(header::CACHE_CONTROL, "no-store")
    .body(Full::new(artifact.bytes))?;

  Ok(resp)
}

// Server-sent events carrying the download's completion fraction. The
// stream ends when the download with the same token finishes.
async fn progress(
  State(board): State<ProgressBoard>,
  Query(req): Query<ProgressReq>,
) -> Result<impl IntoResponse> {
  let token = check_token(req.token.as_deref())?;
  let events = board.subscribe(token).fractions().map(|fraction| {
    Ok::<_, Infallible>(Event::default().data(format!("{fraction:.3}")))
  });

  Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// filenames are already stripped of quotes and control characters; any
// remaining non-ascii is sent as raw utf-8.
fn content_disposition(filename: &str) -> HeaderValue {
  let value = format!("attachment; filename=\"{filename}\"");
  HeaderValue::from_bytes(value.as_bytes()).unwrap_or_else(|e| {
    warn!(
      filename = %filename,
      "unusable content-disposition, using default: {e}"
    );
    HeaderValue::from_static("attachment; filename=\"audio.mp3\"")
  })
}

/// The HTTP service. Constructed and started explicitly by its owner.
pub struct ApiService {
  addr: SocketAddr,
  converter: Converter,
}

/// Handle to a started [`ApiService`].
pub struct RunningService {
  addr: SocketAddr,
  shutdown: oneshot::Sender<()>,
  task: JoinHandle<Result<()>>,
}

impl ApiService {
  pub fn new(addr: SocketAddr, converter: Converter) -> Self {
    Self { addr, converter }
  }

  /// Binds the listener and spawns the server on the current runtime.
  pub fn start(self) -> Result<RunningService> {
    let listener = TcpListener::bind(self.addr)?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;

    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::Server::from_tcp(listener)
      .map_err(|e| Error::Server(e.to_string()))?
      .serve(router(self.converter).into_make_service())
      .with_graceful_shutdown(async move {
        shutdown_rx.await.ok();
      });

    let task = tokio::spawn(async move {
      server.await.map_err(|e| Error::Server(e.to_string()))
    });

    Ok(RunningService {
      addr,
      shutdown,
      task,
    })
  }
}

impl RunningService {
  pub fn addr(&self) -> SocketAddr {
    self.addr
  }

  /// Stops accepting connections and waits for in-flight requests.
  pub async fn stop(self) -> Result<()> {
    self.shutdown.send(()).ok();
    self
      .task
      .await
      .map_err(|e| Error::Server(e.to_string()))??;
    info!("server on {} stopped", self.addr);
    Ok(())
  }
}
