mod ytdlp;

use async_trait::async_trait;

use crate::{media::MediaDescriptor, Result};

pub use ytdlp::Ytdlp;

/// Resolves a video page URL into a directly fetchable audio resource.
///
/// Any failure surfaces as `Error::Extraction`; callers never retry.
#[async_trait]
pub trait Extractor: Send + Sync {
  async fn resolve(&self, url: &str) -> Result<MediaDescriptor>;
}
