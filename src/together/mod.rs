pub mod image_client;

use crate::{error::Result, models::ImagePayload};
use async_trait::async_trait;

pub use image_client::ImageClient;

/// Something that turns a prompt into one encoded image.
///
/// The store only talks to this trait, so a front end can be driven by
/// [`ImageClient`] in production and by a scripted double in tests.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// One request, no retry. The prompt has already been validated.
    async fn generate(&self, prompt: &str) -> Result<ImagePayload>;
}

#[async_trait]
impl ImageGenerator for ImageClient {
    async fn generate(&self, prompt: &str) -> Result<ImagePayload> {
        ImageClient::generate(self, prompt).await
    }
}
