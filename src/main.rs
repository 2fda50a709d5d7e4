use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod convert;
mod error;
mod extractor;
mod media;
mod progress;
#[cfg(test)]
mod testing;
mod transcoder;
mod ui;
mod util;
mod validate;

pub use error::{Error, Result};

use crate::{
  api::ApiService, config::Config, convert::Converter, extractor::Ytdlp,
  transcoder::Ffmpeg,
};

#[tokio::main]
async fn main() -> Result<()> {
  init_logging();

  let config = Config::from_env()?;
  let converter = Converter::new(
    Ytdlp::new(&config.ytdlp_path, config.ytdlp_proxy.clone()),
    Ffmpeg::new(&config.ffmpeg_path),
  );
  let service = ApiService::new(config.bind_addr, converter);

  Toplevel::new(|s| async move {
    s.start(SubsystemBuilder::new("api", move |subsys| {
      run_api(subsys, service)
    }));
  })
  .catch_signals()
  .handle_shutdown_requests(config.shutdown_timeout)
  .await
  .map_err(|e| Error::Server(e.to_string()))
}

async fn run_api(subsys: SubsystemHandle, service: ApiService) -> Result<()> {
  let running = service.start()?;
  info!("listening on http://{}", running.addr());
  subsys.on_shutdown_requested().await;
  info!("shutdown requested");
  running.stop().await
}

fn init_logging() {
  let env_filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("info,youtube_mp3_stream=debug"));

  tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
