use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use super::error::ConversionError;
use crate::models::blob::{JPEG_MIME, PNG_MIME};

pub const DEFAULT_QUALITY: f32 = 0.9;

/// Output raster format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => PNG_MIME,
            ImageFormat::Jpeg => JPEG_MIME,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            other => Err(format!("unsupported image format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    pub format: ImageFormat,
    /// 0.0 – 1.0. JPEG uses it directly; PNG is lossless and maps it onto compression effort.
    pub quality: f32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Encodes a rendered surface. CPU bound: call from a blocking context.
pub fn encode_surface(
    surface: &RgbaImage,
    options: EncodeOptions,
) -> Result<Vec<u8>, ConversionError> {
    let (width, height) = surface.dimensions();
    let mut out = Vec::new();

    match options.format {
        ImageFormat::Png => {
            PngEncoder::new_with_quality(
                &mut out,
                png_compression(options.quality),
                FilterType::Adaptive,
            )
            .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        }
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(surface.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality(options.quality))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| ConversionError::Encode(e.to_string()))?;
        }
    }

    if out.is_empty() {
        return Err(ConversionError::Encode("encoder produced no data".to_string()));
    }
    Ok(out)
}

fn png_compression(quality: f32) -> CompressionType {
    if quality >= 0.95 {
        CompressionType::Best
    } else if quality >= 0.5 {
        CompressionType::Default
    } else {
        CompressionType::Fast
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
