use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not an image file: {0}")]
    NotAnImage(String),
    #[error("Image is {size} bytes, the limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
}

/// An image sent inline with a message, stored as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub mime: String,
    pub data_url: String,
}

impl ImageAttachment {
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Result<Self, AttachmentError> {
        if !mime.starts_with("image/") {
            return Err(AttachmentError::NotAnImage(mime.to_string()));
        }
        Ok(Self {
            mime: mime.to_string(),
            data_url: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
        })
    }

    pub async fn from_file(path: &Path, max_bytes: u64) -> Result<Self, AttachmentError> {
        let mime = mime_for(path)
            .ok_or_else(|| AttachmentError::NotAnImage(path.display().to_string()))?;

        let size = tokio::fs::metadata(path).await?.len();
        if size > max_bytes {
            return Err(AttachmentError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(mime, &bytes)
    }

    /// Size of the decoded payload.
    pub fn byte_len(&self) -> usize {
        self.data_url
            .split_once(',')
            .and_then(|(_, b64)| STANDARD.decode(b64).ok())
            .map_or(0, |bytes| bytes.len())
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
