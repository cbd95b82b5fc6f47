use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

pub const IMAGE_WIDTH: u32 = 1024;
pub const IMAGE_HEIGHT: u32 = 768;
pub const DIFFUSION_STEPS: u32 = 4;
pub const IMAGE_COUNT: u32 = 1;
pub const RESPONSE_FORMAT: &str = "b64_json";

/// Body of `POST /images/generations`. Everything except model and prompt is
/// fixed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub n: u32,
    pub response_format: String,
}

impl ImageGenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
            steps: DIFFUSION_STEPS,
            n: IMAGE_COUNT,
            response_format: RESPONSE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
pub struct ImageDatum {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceErrorBody {
    pub error: ServiceErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ServiceErrorDetail {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }
}

/// Base64 image data exactly as the service returned it, plus its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePayload {
    data: String,
    format: ImageFormat,
}

impl ImagePayload {
    /// Validates `data` as base64 and sniffs the format from the decoded
    /// bytes. The text itself is kept untouched.
    pub fn from_base64(data: impl Into<String>) -> Result<Self> {
        let data = data.into();
        let bytes = decode_base64(&data)?;
        if bytes.is_empty() {
            return Err(GenerationError::DecodeError("image payload is empty".into()));
        }
        let format = ImageFormat::from_magic_bytes(&bytes).unwrap_or_default();
        Ok(Self { data, format })
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            format: ImageFormat::from_magic_bytes(bytes).unwrap_or_default(),
        }
    }

    pub fn base64(&self) -> &str {
        &self.data
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64(&self.data)
    }

    /// `data:` URL usable directly as an image source.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.data)
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| GenerationError::DecodeError(e.to_string()))
}
