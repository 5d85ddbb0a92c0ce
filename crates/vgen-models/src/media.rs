//! Binary payloads carried by work items.
//!
//! Images are the optional input of a work item, videos are the artifact a
//! completed item carries. Both wrap [`Bytes`] so clones are cheap and the
//! payload is released when the last owner drops it.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use thiserror::Error;

/// Default mime type of a generated video.
pub const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// Errors raised when building media payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Image is empty")]
    EmptyImage,

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
}

/// Image payload attached to a work item.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    bytes: Bytes,
    mime_type: String,
    file_name: Option<String>,
}

impl ImageData {
    /// Create an image from raw bytes and an explicit mime type.
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Result<Self, MediaError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(MediaError::EmptyImage);
        }

        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(MediaError::UnsupportedType(mime_type));
        }

        Ok(Self {
            bytes,
            mime_type,
            file_name: None,
        })
    }

    /// Create an image from a file's bytes, guessing the mime type from its name.
    pub fn from_file(bytes: impl Into<Bytes>, file_name: &str) -> Result<Self, MediaError> {
        let mime = mime_guess::from_path(file_name)
            .first()
            .map(|m| m.essence_str().to_string())
            .ok_or_else(|| MediaError::UnsupportedType(file_name.to_string()))?;

        let mut image = Self::new(bytes, mime)?;
        image.file_name = Some(file_name.to_string());
        Ok(image)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// File name without its extension, if the image came from a file.
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.file_name.as_deref()?;
        let stem = match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        };
        Some(stem)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 encoding of the payload, as the remote API expects it.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Generated video held by a completed item.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    bytes: Bytes,
    mime_type: String,
}

impl VideoArtifact {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self::with_mime(bytes, DEFAULT_VIDEO_MIME)
    }

    pub fn with_mime(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the mime type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => "mp4",
        }
    }
}

impl fmt::Debug for VideoArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoArtifact")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
