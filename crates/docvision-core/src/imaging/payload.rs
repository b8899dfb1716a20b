//! Base64 image payloads for embedding in JSON request bodies.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::error::{InferenceError, ItemResult};

/// Base64-encoded image ready to send to a vision model.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes, sniffing the MIME type from content.
    ///
    /// Bytes with no recognizable signature are tagged `image/jpeg`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let media_type = match image::guess_format(bytes) {
            Ok(format) => media_type(format),
            Err(_) => {
                tracing::warn!("Unknown image format, defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: BASE64.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Read the original file bytes. No resizing is applied.
    pub async fn from_file(path: &Path) -> ItemResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InferenceError::image_load(path, format!("Failed to read image: {e}")))?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self::from_bytes(&bytes))
    }

    /// Encode a decoded image as PNG.
    ///
    /// PNG keeps rendered text crisp, which matters more than size for extraction.
    pub fn from_image(image: &DynamicImage, path: &Path) -> ItemResult<Self> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| InferenceError::image_load(path, format!("PNG encode failed: {e}")))?;
        let bytes = buffer.into_inner();

        Ok(Self {
            data: BASE64.encode(&bytes),
            media_type: "image/png".to_string(),
        })
    }

    /// Return a data URL suitable for chat-completions APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Encode the original file at `path` as a `data:` URL.
pub async fn encode_to_data_url(path: &Path) -> ItemResult<String> {
    Ok(ImageInput::from_file(path).await?.data_url())
}

fn media_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Bmp => "image/bmp",
        other => {
            tracing::warn!("Unmapped image format {other:?}, defaulting to image/jpeg");
            "image/jpeg"
        }
    }
}
