//! Builder for image payloads used in tests

use bytes::Bytes;
use pixcache_core::{ImageFormat, ImagePayload};

/// Builder for [`ImagePayload`] test data
#[derive(Debug, Clone)]
pub struct TestPayloadBuilder {
    bytes: Vec<u8>,
    validator: Option<String>,
    format: ImageFormat,
}

impl TestPayloadBuilder {
    /// A small PNG-tagged payload with no validator
    pub fn new() -> Self {
        Self {
            bytes: b"\x89PNG\r\n\x1a\n".to_vec(),
            validator: None,
            format: ImageFormat::Png,
        }
    }

    /// Fill the payload with `len` bytes of a repeating pattern
    pub fn with_size(mut self, len: usize) -> Self {
        self.bytes = (0..len).map(|i| (i % 251) as u8).collect();
        self
    }

    pub fn with_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.bytes = bytes.into();
        self
    }

    pub fn with_validator(mut self, validator: &str) -> Self {
        self.validator = Some(validator.to_string());
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn build(self) -> ImagePayload {
        ImagePayload {
            bytes: Bytes::from(self.bytes),
            validator: self.validator,
            format: self.format,
        }
    }
}

impl Default for TestPayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let payload = TestPayloadBuilder::new()
            .with_size(300)
            .with_validator("\"abc\"")
            .with_format(ImageFormat::Gif)
            .build();

        assert_eq!(payload.bytes.len(), 300);
        assert_eq!(payload.bytes[252], 1);
        assert_eq!(payload.validator.as_deref(), Some("\"abc\""));
        assert_eq!(payload.format, ImageFormat::Gif);
    }
}
