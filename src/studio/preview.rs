use crate::models::{GenerationRecord, IMAGE_HEIGHT, IMAGE_WIDTH};

/// Full-size view of one record. `None` closes it.
pub trait PreviewSurface {
    fn set_preview(&mut self, record: Option<&GenerationRecord>);
}

/// Renders the preview as a text block on stdout.
#[derive(Debug, Default)]
pub struct TerminalPreview;

impl TerminalPreview {
    pub fn render(record: &GenerationRecord) -> String {
        let image = record.image();
        format!(
            "┌─ image #{} ({}x{}, {})\n│ prompt:  {}\n│ created: {}\n│ size:    {} base64 chars\n└─ :save {} to download, :close to dismiss",
            record.id(),
            IMAGE_WIDTH,
            IMAGE_HEIGHT,
            image.mime_type(),
            record.prompt(),
            record.created_at().format("%Y-%m-%d %H:%M:%S UTC"),
            image.base64().len(),
            record.id()
        )
    }
}

impl PreviewSurface for TerminalPreview {
    fn set_preview(&mut self, record: Option<&GenerationRecord>) {
        match record {
            Some(record) => println!("{}", Self::render(record)),
            None => println!("(preview closed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImagePayload, RecordId};

    #[test]
    fn test_render() {
        let record = GenerationRecord::new(
            RecordId(3),
            "a red fox in snow".into(),
            ImagePayload::from_base64("iVBORw0KGgo=").unwrap(),
        );
        let text = TerminalPreview::render(&record);
        assert!(text.starts_with("┌─ image #3 (1024x768, image/png)"));
        assert!(text.contains("│ prompt:  a red fox in snow"));
        assert!(text.contains("12 base64 chars"));
        assert!(text.ends_with(":save 3 to download, :close to dismiss"));
    }
}
