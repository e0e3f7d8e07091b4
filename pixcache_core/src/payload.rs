//! Image bytes as fetched and cached

use crate::size::DataSize;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Encoded image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    #[default]
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Infer the format from the extension of the last path segment of a
    /// resource identifier. Unknown or missing extensions fall back to JPEG.
    pub fn from_resource(resource: &str) -> Self {
        let path = resource
            .split(['?', '#'])
            .next()
            .unwrap_or(resource);
        let file_name = path.rsplit('/').next().unwrap_or(path);

        match file_name.rsplit_once('.') {
            Some((_, ext)) => match ext.to_ascii_lowercase().as_str() {
                "png" => Self::Png,
                "gif" => Self::Gif,
                "webp" => Self::Webp,
                _ => Self::Jpeg,
            },
            None => Self::Jpeg,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// Raw image bytes plus the validator the origin sent with them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub bytes: Bytes,
    /// Entity tag to send back on revalidation
    pub validator: Option<String>,
    pub format: ImageFormat,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Bytes>, format: ImageFormat) -> Self {
        Self {
            bytes: bytes.into(),
            validator: None,
            format,
        }
    }

    pub fn with_validator(mut self, validator: impl Into<String>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    /// Accounted cost of this payload in a cache tier
    pub fn size(&self) -> DataSize {
        DataSize::from_len(self.bytes.len())
    }
}
