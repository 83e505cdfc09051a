//! File info probe: byte size, MIME by extension, and pixel dimensions for
//! images.

use std::sync::Arc;

use mediaforge_core::{MediaError, MediaResult};
use mediaforge_storage::{paths, Storage};

/// Live facts about one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Probes stored objects for their physical attributes.
#[derive(Clone)]
pub struct FileInfoProbe {
    storage: Arc<dyn Storage>,
}

impl FileInfoProbe {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Probe the object at `key`. Pixel dimensions are read only for image
    /// MIME types; a dimension read failure is logged, not fatal (the size
    /// and MIME facts are still useful).
    pub async fn probe(&self, key: &str) -> MediaResult<FileInfo> {
        let size = self.storage.content_length(key).await.map_err(MediaError::from)?;
        let mime_type = paths::mime_type(key).map(String::from);

        let mut width = None;
        let mut height = None;
        if paths::is_image(key) {
            let data = self.storage.download(key).await.map_err(MediaError::from)?;
            match image_dimensions(&data) {
                Ok((w, h)) => {
                    width = Some(w);
                    height = Some(h);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to read image dimensions");
                }
            }
        }

        Ok(FileInfo {
            size,
            mime_type,
            width,
            height,
        })
    }
}

/// Pixel dimensions of an encoded image, without a full decode.
pub fn image_dimensions(data: &[u8]) -> MediaResult<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| MediaError::Decode(format!("Unrecognized image data: {}", e)))?;
    reader
        .into_dimensions()
        .map_err(|e| MediaError::Decode(format!("Failed to read dimensions: {}", e)))
}
