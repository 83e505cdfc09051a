//! Application configuration, deserialized from the environment.
//!
//! Each section is loaded with `envy` under its own prefix (for example
//! `MEDIAFORGE_STORAGE_BACKEND`, `MEDIAFORGE_MEDIA_SIZES`). Configuration is an
//! explicit struct handed to services; nothing reads ambient global state.

use serde::Deserialize;

use crate::error::{MediaError, MediaResult};
use crate::models::{CompressionPolicy, OutputFormat, ResizeMode, SizeSpecSet, VideoPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "local" or "s3".
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Base URL under which stored objects are served (CDN origin).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
    /// Cache-Control header applied to stored objects.
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_path() -> String {
    "./data/media".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000/media".to_string()
}

fn default_cache_control() -> String {
    "public, max-age=31536000, immutable".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Named sizes as "name=target[,name=target]". Target is a height in
    /// pixels by default; append `w` to target the width instead
    /// (e.g. "icon=64,thumb=240,banner=1200w").
    #[serde(default = "default_sizes")]
    pub sizes: String,
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Output format for compressed images: webp/jpeg/png/avif/preserve.
    #[serde(default = "default_format")]
    pub format: String,
    /// Resize mode for the primary compress pass: contain/cover/crop.
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Files smaller than this are stored without a compression pass.
    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,
}

fn default_sizes() -> String {
    "icon=64,thumb=240,card=480".to_string()
}

fn default_quality() -> u8 {
    80
}

fn default_format() -> String {
    "webp".to_string()
}

fn default_mode() -> String {
    "contain".to_string()
}

fn default_max_width() -> u32 {
    3840
}

fn default_max_height() -> u32 {
    2160
}

fn default_min_bytes() -> u64 {
    10 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    /// "webm" (vp9/opus) or "mp4" (h264/aac).
    #[serde(default = "default_video_format")]
    pub format: String,
    #[serde(default)]
    pub crf: Option<u8>,
    #[serde(default)]
    pub preset: Option<String>,
    /// Video bitrate in kbit/s; None lets CRF drive the rate.
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
    /// Cap output framerate when > 0.
    #[serde(default)]
    pub framerate_cap: f32,
    /// Seconds into the video at which the poster thumbnail is extracted.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: f64,
    #[serde(default = "default_video_timeout")]
    pub timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_video_format() -> String {
    "webm".to_string()
}

fn default_audio_bitrate() -> u32 {
    128
}

fn default_thumbnail_offset() -> f64 {
    1.0
}

fn default_video_timeout() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

fn default_max_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Per-unit result summaries kept on the progress record.
    #[serde(default = "default_detail_cap")]
    pub detail_cap: usize,
    /// Emit an intermediate progress event every Nth completion.
    #[serde(default = "default_notify_every")]
    pub notify_every: u32,
    /// Abandoned progress records are evicted after this many seconds.
    #[serde(default = "default_batch_ttl")]
    pub ttl_secs: u64,
}

fn default_detail_cap() -> usize {
    10
}

fn default_notify_every() -> u32 {
    10
}

fn default_batch_ttl() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "postgres://localhost/mediaforge".to_string()
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub video: VideoConfig,
    pub worker: WorkerConfig,
    pub batch: BatchConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from the environment (reads `.env` when present).
    pub fn from_env() -> MediaResult<Self> {
        dotenvy::dotenv().ok();

        let storage: StorageConfig = envy::prefixed("MEDIAFORGE_STORAGE_")
            .from_env()
            .map_err(|e| MediaError::InvalidInput(format!("storage config: {}", e)))?;
        let media: MediaConfig = envy::prefixed("MEDIAFORGE_MEDIA_")
            .from_env()
            .map_err(|e| MediaError::InvalidInput(format!("media config: {}", e)))?;
        let video: VideoConfig = envy::prefixed("MEDIAFORGE_VIDEO_")
            .from_env()
            .map_err(|e| MediaError::InvalidInput(format!("video config: {}", e)))?;
        let worker: WorkerConfig = envy::prefixed("MEDIAFORGE_WORKER_")
            .from_env()
            .map_err(|e| MediaError::InvalidInput(format!("worker config: {}", e)))?;
        let batch: BatchConfig = envy::prefixed("MEDIAFORGE_BATCH_")
            .from_env()
            .map_err(|e| MediaError::InvalidInput(format!("batch config: {}", e)))?;
        let database: DatabaseConfig = envy::prefixed("MEDIAFORGE_DATABASE_")
            .from_env()
            .map_err(|e| MediaError::InvalidInput(format!("database config: {}", e)))?;

        let config = Self {
            storage,
            media,
            video,
            worker,
            batch,
            database,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> MediaResult<()> {
        if !(1..=100).contains(&self.media.quality) {
            return Err(MediaError::InvalidInput(format!(
                "quality must be 1-100, got {}",
                self.media.quality
            )));
        }
        OutputFormat::parse(&self.media.format)?;
        ResizeMode::parse(&self.media.mode)?;
        self.size_specs()?;
        Ok(())
    }

    /// Parse the configured named sizes into a spec set.
    pub fn size_specs(&self) -> MediaResult<SizeSpecSet> {
        SizeSpecSet::parse(&self.media.sizes)
    }

    /// Compression policy for the primary image compress pass.
    pub fn compression_policy(&self) -> MediaResult<CompressionPolicy> {
        Ok(CompressionPolicy {
            quality: self.media.quality,
            format: OutputFormat::parse(&self.media.format)?,
            mode: ResizeMode::parse(&self.media.mode)?,
            max_width: Some(self.media.max_width),
            max_height: Some(self.media.max_height),
            min_bytes: self.media.min_bytes,
        })
    }

    /// Transcode policy for the video pipeline.
    pub fn video_policy(&self) -> MediaResult<VideoPolicy> {
        VideoPolicy::from_config(&self.video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media_defaults() -> MediaConfig {
        serde_json::from_str("{}").unwrap()
    }

    #[test]
    fn media_config_defaults_are_valid() {
        let media = media_defaults();
        assert_eq!(media.quality, 80);
        assert_eq!(media.format, "webp");
        assert_eq!(media.max_width, 3840);
        assert_eq!(media.max_height, 2160);
        assert!(SizeSpecSet::parse(&media.sizes).is_ok());
    }

    #[test]
    fn invalid_quality_rejected() {
        let mut media = media_defaults();
        media.quality = 0;
        let config = AppConfig {
            storage: serde_json::from_str("{}").unwrap(),
            media,
            video: serde_json::from_str("{}").unwrap(),
            worker: serde_json::from_str("{}").unwrap(),
            batch: serde_json::from_str("{}").unwrap(),
            database: DatabaseConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn video_defaults() {
        let video: VideoConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(video.timeout_secs, 3600);
        assert_eq!(video.format, "webm");
        assert_eq!(video.framerate_cap, 0.0);
    }
}
