use std::process::ExitStatus;

use axum::response::{IntoResponse, Response};
use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("missing url parameter")]
  MissingUrl,
  #[error("invalid YouTube URL format: {0}")]
  InvalidUrl(String),
  #[error("invalid progress token")]
  InvalidToken,
  #[error("failed to extract audio info: {0}")]
  Extraction(String),
  #[error("error during conversion: transcoder exited with {0}")]
  Transcode(ExitStatus),
  #[error("invalid configuration for {0}: {1}")]
  Config(&'static str, String),
  #[error("server error: {0}")]
  Server(String),
  #[error(transparent)]
  IO(#[from] std::io::Error),
  #[error(transparent)]
  Http(#[from] http::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn status_code(&self) -> StatusCode {
    match self {
      Error::MissingUrl | Error::InvalidUrl(_) | Error::InvalidToken => {
        StatusCode::BAD_REQUEST
      }
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    (self.status_code(), self.to_string()).into_response()
  }
}
