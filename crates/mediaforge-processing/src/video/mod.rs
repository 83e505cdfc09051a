pub mod engine;
pub mod ffmpeg;

pub use engine::{TranscodedVideo, VideoTransformEngine};
pub use ffmpeg::{FfmpegService, VideoMetadata};
