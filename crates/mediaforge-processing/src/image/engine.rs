//! Image transform engine: decode, resize per policy, re-encode.
//!
//! Encoding goes through the dedicated codec crates (mozjpeg for JPEG, the
//! webp and ravif encoders for WebP/AVIF); PNG stays with the `image` crate's
//! lossless encoder.

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use mediaforge_core::models::{CompressionPolicy, OutputFormat, ResizeMode};
use mediaforge_core::{MediaError, MediaResult};

use crate::dimensions::compute_dimensions;

/// Result of one re-encode pass.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

impl TransformedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Stateless image transformation engine. Every call decodes from the
/// original bytes, so one bad pass cannot contaminate another.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTransformEngine;

impl ImageTransformEngine {
    pub fn new() -> Self {
        Self
    }

    /// Primary compress pass: decode, clamp to the policy ceilings, resize
    /// per the policy mode, and re-encode in the policy format.
    ///
    /// Contain scales down proportionally. Cover and crop treat the ceiling
    /// pair as an exact target box once the source exceeds it on either axis.
    /// Nothing upscales.
    ///
    /// `source_ext` resolves `OutputFormat::Preserve` to a concrete format;
    /// unrecognized extensions fall back to JPEG.
    pub fn compress(
        &self,
        data: &[u8],
        policy: &CompressionPolicy,
        source_ext: Option<&str>,
    ) -> MediaResult<TransformedImage> {
        policy.validate()?;
        let img = decode(data)?;
        let (orig_w, orig_h) = img.dimensions();

        let (target_w, target_h) = match (policy.mode, policy.max_width, policy.max_height) {
            (ResizeMode::Cover | ResizeMode::Crop, Some(max_w), Some(max_h))
                if orig_w > max_w || orig_h > max_h =>
            {
                (max_w, max_h)
            }
            _ => compute_dimensions(
                orig_w,
                orig_h,
                None,
                None,
                policy.max_width,
                policy.max_height,
            ),
        };
        let resized = apply_resize(&img, target_w, target_h, policy.mode);

        let format = resolve_format(policy.format, source_ext);
        encode(&resized, format, policy.quality)
    }

    /// Resize to exact dimensions and encode. Used for named-size variant
    /// generation, where the caller has already derived the dimensions.
    pub fn resize_to(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        format: OutputFormat,
        quality: u8,
        source_ext: Option<&str>,
    ) -> MediaResult<TransformedImage> {
        let img = decode(data)?;
        let resized = apply_resize(&img, width, height, ResizeMode::Crop);
        encode(&resized, resolve_format(format, source_ext), quality)
    }
}

fn decode(data: &[u8]) -> MediaResult<DynamicImage> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| MediaError::Decode(format!("Unrecognized image data: {}", e)))?
        .decode()
        .map_err(|e| MediaError::Decode(format!("Failed to decode image: {}", e)))
}

fn resolve_format(format: OutputFormat, source_ext: Option<&str>) -> OutputFormat {
    match format {
        OutputFormat::Preserve => source_ext
            .and_then(OutputFormat::from_extension)
            .unwrap_or(OutputFormat::Jpeg),
        other => other,
    }
}

fn apply_resize(img: &DynamicImage, width: u32, height: u32, mode: ResizeMode) -> DynamicImage {
    let (orig_w, orig_h) = img.dimensions();
    if (orig_w, orig_h) == (width, height) {
        return img.clone();
    }
    let filter = select_filter(orig_w, orig_h, width, height);
    match mode {
        // Contain never upscales: a target box larger than the original on
        // both axes leaves the image untouched.
        ResizeMode::Contain => {
            if width >= orig_w && height >= orig_h {
                img.clone()
            } else {
                img.resize(width, height, filter)
            }
        }
        ResizeMode::Cover => img.resize_to_fill(width, height, filter),
        ResizeMode::Crop => img.resize_exact(width, height, filter),
    }
}

/// Lanczos3 for downscaling quality, CatmullRom when growing an axis.
fn select_filter(orig_w: u32, orig_h: u32, target_w: u32, target_h: u32) -> image::imageops::FilterType {
    if target_w > orig_w || target_h > orig_h {
        image::imageops::FilterType::CatmullRom
    } else {
        image::imageops::FilterType::Lanczos3
    }
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> MediaResult<TransformedImage> {
    let (width, height) = img.dimensions();
    let bytes = match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality)?,
        OutputFormat::Png => encode_png(img)?,
        OutputFormat::WebP => encode_webp(img, quality),
        OutputFormat::Avif => encode_avif(img, quality)?,
        // Preserve has been resolved by the caller; reaching here means a
        // source with no recognizable extension.
        OutputFormat::Preserve => encode_jpeg(img, quality)?,
    };
    Ok(TransformedImage {
        bytes,
        width,
        height,
        format,
    })
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> MediaResult<Bytes> {
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp
        .start_compress(Vec::new())
        .map_err(|e| MediaError::Internal(format!("jpeg encode failed: {}", e)))?;
    comp.write_scanlines(&rgb_img)
        .map_err(|e| MediaError::Internal(format!("jpeg encode failed: {}", e)))?;
    let jpeg_data = comp
        .finish()
        .map_err(|e| MediaError::Internal(format!("jpeg encode failed: {}", e)))?;

    Ok(Bytes::from(jpeg_data))
}

fn encode_png(img: &DynamicImage) -> MediaResult<Bytes> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| MediaError::Internal(format!("png encode failed: {}", e)))?;
    Ok(Bytes::from(buffer))
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Bytes {
    let (width, height) = img.dimensions();
    let rgba_img = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
    let webp_data = encoder.encode(quality as f32);
    Bytes::copy_from_slice(&webp_data)
}

fn encode_avif(img: &DynamicImage, quality: u8) -> MediaResult<Bytes> {
    let (width, height) = img.dimensions();
    let rgb_img = img.to_rgb8();
    let rgb_data: Vec<rgb::RGB8> = rgb_img
        .as_raw()
        .chunks_exact(3)
        .map(|chunk| rgb::RGB8::new(chunk[0], chunk[1], chunk[2]))
        .collect();

    let img_buf = ravif::Img::new(rgb_data.as_slice(), width as usize, height as usize);
    let encoder = ravif::Encoder::new()
        .with_quality(quality as f32)
        .with_speed(6);
    let avif = encoder
        .encode_rgb(img_buf)
        .map_err(|e| MediaError::Internal(format!("avif encode failed: {}", e)))?;

    Ok(Bytes::copy_from_slice(&avif.avif_file))
}
