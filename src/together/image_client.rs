use crate::{
    config::TogetherConfig,
    error::{GenerationError, Result},
    logger,
    models::{ImageGenerationRequest, ImageGenerationResponse, ImagePayload, ServiceErrorBody},
};
use reqwest::Client;

#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    config: TogetherConfig,
}

impl ImageClient {
    /// The credential is not checked here; a missing key surfaces on the
    /// first `generate` call.
    pub fn new(config: TogetherConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            GenerationError::ConfigError(format!("failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/images/generations", self.config.base_url())
    }

    pub fn model(&self) -> &str {
        self.config.model()
    }

    pub async fn generate(&self, prompt: &str) -> Result<ImagePayload> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GenerationError::ConfigError("TOGETHER_API_KEY is not set".into()))?;

        let request = ImageGenerationRequest::new(self.model(), prompt);

        log::info!("Generating image with model: {}", request.model);
        log::debug!(
            "Image request: {}x{}, {} steps, prompt of {} chars",
            request.width,
            request.height,
            request.steps,
            prompt.chars().count()
        );

        // Left unstopped on failure; it then logs as abandoned.
        let mut timer = logger::timer("image generation");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        let payload = parse_response(status, &body)?;
        let elapsed = timer.stop();
        log::debug!(
            "Received {} payload ({} base64 chars) in {}ms",
            payload.mime_type(),
            payload.base64().len(),
            elapsed.as_millis()
        );

        Ok(payload)
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            if let Some(timeout) = self.config.timeout() {
                return GenerationError::Timeout(timeout);
            }
        }
        GenerationError::RequestError(e.to_string())
    }
}

pub(crate) fn parse_response(status: u16, body: &str) -> Result<ImagePayload> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ServiceErrorBody>(body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        log::error!("Image service returned {}: {}", status, message);
        return Err(GenerationError::ServiceError { status, message });
    }

    let response: ImageGenerationResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::ResponseError(e.to_string()))?;

    let first = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::ResponseError("No images generated".into()))?;

    let encoded = first.b64_json.ok_or_else(|| {
        GenerationError::ResponseError("image entry has no b64_json field".into())
    })?;

    ImagePayload::from_base64(encoded)
}
