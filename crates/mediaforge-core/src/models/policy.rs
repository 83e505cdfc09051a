//! Compression and transcode policy value objects.

use serde::{Deserialize, Serialize};

use crate::config::VideoConfig;
use crate::error::{MediaError, MediaResult};

/// Output format for compressed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    WebP,
    Jpeg,
    Png,
    Avif,
    /// Keep whatever format the source extension implies.
    Preserve,
}

impl OutputFormat {
    pub fn parse(s: &str) -> MediaResult<Self> {
        match s.to_lowercase().as_str() {
            "webp" => Ok(OutputFormat::WebP),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "avif" => Ok(OutputFormat::Avif),
            "preserve" | "preserve-original" => Ok(OutputFormat::Preserve),
            _ => Err(MediaError::InvalidInput(format!("Invalid format: {}", s))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Avif => "avif",
            OutputFormat::Preserve => "",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Preserve => "application/octet-stream",
        }
    }

    /// Format implied by a file extension; used to resolve `Preserve`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "webp" => Some(OutputFormat::WebP),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "avif" => Some(OutputFormat::Avif),
            _ => None,
        }
    }
}

/// How requested dimensions are applied to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Scale down preserving aspect ratio; never upscale.
    Contain,
    /// Scale and center-crop to exactly fill the target box.
    Cover,
    /// Force exact dimensions, discarding aspect ratio.
    Crop,
}

impl ResizeMode {
    pub fn parse(s: &str) -> MediaResult<Self> {
        match s.to_lowercase().as_str() {
            "contain" => Ok(ResizeMode::Contain),
            "cover" => Ok(ResizeMode::Cover),
            "crop" => Ok(ResizeMode::Crop),
            _ => Err(MediaError::InvalidInput(format!(
                "Invalid resize mode: {}",
                s
            ))),
        }
    }
}

/// Policy for the primary image compress pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionPolicy {
    /// 1-100. Ignored for PNG (lossless).
    pub quality: u8,
    pub format: OutputFormat,
    pub mode: ResizeMode,
    /// Hard ceilings, never exceeded regardless of requested dimensions.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Sources smaller than this skip the compress pass entirely.
    pub min_bytes: u64,
}

impl CompressionPolicy {
    pub fn validate(&self) -> MediaResult<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(MediaError::InvalidInput(format!(
                "quality must be 1-100, got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

/// Container/codec pair for video transcode output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    /// webm with vp9 video and opus audio.
    Webm,
    /// mp4 with h264 video and aac audio.
    Mp4,
}

impl VideoContainer {
    pub fn parse(s: &str) -> MediaResult<Self> {
        match s.to_lowercase().as_str() {
            "webm" => Ok(VideoContainer::Webm),
            "mp4" => Ok(VideoContainer::Mp4),
            _ => Err(MediaError::InvalidInput(format!(
                "Invalid video format: {}",
                s
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            VideoContainer::Webm => "webm",
            VideoContainer::Mp4 => "mp4",
        }
    }

    pub fn video_codec(self) -> &'static str {
        match self {
            VideoContainer::Webm => "libvpx-vp9",
            VideoContainer::Mp4 => "libx264",
        }
    }

    pub fn audio_codec(self) -> &'static str {
        match self {
            VideoContainer::Webm => "libopus",
            VideoContainer::Mp4 => "aac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            VideoContainer::Webm => "video/webm",
            VideoContainer::Mp4 => "video/mp4",
        }
    }
}

/// Policy for a video transcode pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPolicy {
    pub container: VideoContainer,
    pub crf: Option<u8>,
    pub preset: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub audio_bitrate_kbps: u32,
    pub threads: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Applied as an fps filter when > 0.
    pub framerate_cap: f32,
    pub thumbnail_offset_secs: f64,
    pub timeout_secs: u64,
}

impl VideoPolicy {
    pub fn from_config(config: &VideoConfig) -> MediaResult<Self> {
        Ok(Self {
            container: VideoContainer::parse(&config.format)?,
            crf: config.crf,
            preset: config.preset.clone(),
            bitrate_kbps: config.bitrate_kbps,
            audio_bitrate_kbps: config.audio_bitrate_kbps,
            threads: config.threads,
            max_width: config.max_width,
            max_height: config.max_height,
            framerate_cap: config.framerate_cap,
            thumbnail_offset_secs: config.thumbnail_offset_secs,
            timeout_secs: config.timeout_secs,
        })
    }
}

/// Savings of a compress pass as a percentage string, rounded to 2 decimals.
/// Negative when the output grew. Reporting value only, never stored as
/// precision-sensitive state.
pub fn compression_ratio_percent(original_bytes: u64, compressed_bytes: u64) -> String {
    if original_bytes == 0 {
        return "0.00%".to_string();
    }
    let ratio = 1.0 - compressed_bytes as f64 / original_bytes as f64;
    format!("{:.2}%", ratio * 100.0)
}
