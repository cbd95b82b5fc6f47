use std::time::Duration;

use crate::models::RecordId;

/// Failure of a single call to the image service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Service error: {status} - {message}")]
    ServiceError { status: u16, message: String },
    #[error("Response error: {0}")]
    ResponseError(String),
    #[error("Decode error: {0}")]
    DecodeError(String),
}

impl GenerationError {
    /// Short text suitable for a status line in the front end.
    pub fn notice(&self) -> String {
        match self {
            GenerationError::ConfigError(_) => "image service is not configured".to_string(),
            GenerationError::ServiceError { status, .. } => {
                format!("image service rejected the request ({})", status)
            }
            GenerationError::Timeout(_) => "image service did not answer in time".to_string(),
            _ => "image generation failed".to_string(),
        }
    }
}

/// Why the store refused or failed a submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("prompt is empty")]
    InvalidInput,
    #[error("a generation is already in progress")]
    AlreadyInProgress,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("no generated image with id {0}")]
    UnknownRecord(RecordId),
    #[error("stored image could not be decoded: {0}")]
    Decode(#[from] GenerationError),
    #[error("failed to save image: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GenerationError::ServiceError {
            status: 401,
            message: "invalid api key".into(),
        };
        assert_eq!(err.to_string(), "Service error: 401 - invalid api key");

        let err = GenerationError::ConfigError("TOGETHER_API_KEY is not set".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: TOGETHER_API_KEY is not set"
        );
    }

    #[test]
    fn test_submit_error_wraps_generation_error() {
        let err: SubmitError = GenerationError::ResponseError("No images generated".into()).into();
        assert_eq!(err.to_string(), "Response error: No images generated");
        assert_eq!(SubmitError::AlreadyInProgress.to_string(), "a generation is already in progress");
    }

    #[test]
    fn test_notice() {
        let err = GenerationError::ServiceError {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(err.notice(), "image service rejected the request (429)");
        assert_eq!(
            GenerationError::DecodeError("bad".into()).notice(),
            "image generation failed"
        );
    }
}
