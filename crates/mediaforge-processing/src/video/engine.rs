//! Video transcode orchestration: temp-dir scoped probe, transcode, and
//! poster thumbnail extraction.

use bytes::Bytes;
use tempfile::TempDir;

use mediaforge_core::models::VideoPolicy;
use mediaforge_core::{MediaError, MediaResult};

use crate::dimensions::clamp_to_ceiling;
use crate::video::ffmpeg::{FfmpegService, VideoMetadata};

/// Result of one transcode pass. The poster thumbnail is best-effort; its
/// absence never fails the pass.
#[derive(Debug, Clone)]
pub struct TranscodedVideo {
    pub bytes: Bytes,
    pub thumbnail: Option<Bytes>,
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

/// Orchestrates a full transcode inside a scoped temp directory. The
/// directory and any partial output are removed on drop, including after a
/// timeout kill.
#[derive(Debug, Clone)]
pub struct VideoTransformEngine {
    ffmpeg: FfmpegService,
}

impl VideoTransformEngine {
    pub fn new(ffmpeg: FfmpegService) -> Self {
        Self { ffmpeg }
    }

    pub fn ffmpeg(&self) -> &FfmpegService {
        &self.ffmpeg
    }

    /// Probe, clamp dimensions to the policy ceilings, transcode, and
    /// extract the poster frame.
    pub async fn transcode(
        &self,
        data: &[u8],
        policy: &VideoPolicy,
    ) -> MediaResult<TranscodedVideo> {
        self.ffmpeg.ensure_available().await?;

        let temp_dir = TempDir::new()
            .map_err(|e| MediaError::Internal(format!("Failed to create temp directory: {}", e)))?;
        let input_path = temp_dir.path().join("input");
        tokio::fs::write(&input_path, data)
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to write temp input: {}", e)))?;

        let metadata: VideoMetadata = self.ffmpeg.probe(&input_path).await?;
        tracing::debug!(
            width = metadata.width,
            height = metadata.height,
            duration = metadata.duration_seconds,
            "Probed video metadata"
        );

        let (w, h) = clamp_to_ceiling(
            metadata.width,
            metadata.height,
            policy.max_width,
            policy.max_height,
        );
        // Most codecs reject odd dimensions.
        let (w, h) = (even(w), even(h));

        let output_path = temp_dir
            .path()
            .join(format!("output.{}", policy.container.extension()));
        self.ffmpeg
            .transcode(&input_path, &output_path, policy, w, h)
            .await?;

        let bytes = tokio::fs::read(&output_path)
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to read transcode output: {}", e)))?;

        let thumbnail = self
            .extract_thumbnail(&input_path, temp_dir.path(), policy, &metadata)
            .await;

        Ok(TranscodedVideo {
            bytes: Bytes::from(bytes),
            thumbnail,
            width: w,
            height: h,
            duration_seconds: metadata.duration_seconds,
        })
    }

    async fn extract_thumbnail(
        &self,
        input_path: &std::path::Path,
        temp_path: &std::path::Path,
        policy: &VideoPolicy,
        metadata: &VideoMetadata,
    ) -> Option<Bytes> {
        // Clamp the offset inside the clip so short videos still get a frame.
        let offset = policy
            .thumbnail_offset_secs
            .min(metadata.duration_seconds / 2.0)
            .max(0.0);
        let thumb_path = temp_path.join("poster.jpg");
        match self.ffmpeg.frame_at(input_path, &thumb_path, offset).await {
            Ok(()) => match tokio::fs::read(&thumb_path).await {
                Ok(data) => Some(Bytes::from(data)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read extracted thumbnail");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Thumbnail extraction failed");
                None
            }
        }
    }
}

fn even(v: u32) -> u32 {
    (v & !1).max(2)
}
