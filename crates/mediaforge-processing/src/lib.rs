//! Media transformation engines: dimension policy, file probing, image
//! re-encoding, and ffmpeg-backed video transcoding.

pub mod dimensions;
pub mod image;
pub mod probe;
pub mod video;

pub use dimensions::{compute_dimensions, size_for_axis};
pub use image::engine::{ImageTransformEngine, TransformedImage};
pub use probe::{FileInfo, FileInfoProbe};
pub use video::engine::{TranscodedVideo, VideoTransformEngine};
pub use video::ffmpeg::{FfmpegService, VideoMetadata};
