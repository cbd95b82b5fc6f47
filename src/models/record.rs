use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ImagePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One finished generation. Built whole by the store and never changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    id: RecordId,
    prompt: String,
    image: ImagePayload,
    created_at: DateTime<Utc>,
}

impl GenerationRecord {
    pub(crate) fn new(id: RecordId, prompt: String, image: ImagePayload) -> Self {
        Self {
            id,
            prompt,
            image,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn image(&self) -> &ImagePayload {
        &self.image
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accessors() {
        let image = ImagePayload::from_bytes(b"pixels");
        let record = GenerationRecord::new(RecordId(7), "  a lighthouse ".into(), image.clone());
        assert_eq!(record.id(), RecordId(7));
        assert_eq!(record.prompt(), "  a lighthouse ");
        assert_eq!(record.image(), &image);
        assert!(record.created_at() <= Utc::now());
        assert_eq!(RecordId(7).to_string(), "7");
    }
}
