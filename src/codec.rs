//! Pure image transformation codec.
//!
//! `apply` decodes a source buffer, runs the requested edits in a fixed order
//! and encodes the result:
//!
//! | Step | Implementation |
//! |---|---|
//! | Resize | `DynamicImage::resize_exact` with nearest-neighbour sampling |
//! | Crop | bounds-checked `crop_imm` |
//! | Rotate | quarter turns via `image`, other angles via [`geometry::rotate_expand`] |
//! | Grayscale | [`filters::grayscale`] (ITU-R 601 luma, fixed point) |
//! | Sepia | [`filters::sepia`] |
//! | Encode | `image` encoders, after [`prepare_for_encoding`] |
//!
//! Nothing here touches the filesystem or the network; identical inputs
//! always produce identical bytes.

pub mod filters;
pub mod geometry;

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageReader, Limits};

use crate::entities::transformation::{
    CropOptions, OutputFormat, ResizeOptions, TransformationSpec, MAX_DIMENSION,
};
use crate::errors::TransformError;

/// Decodes `source`, applies `spec` and returns the encoded output.
pub fn apply(source: &[u8], spec: &TransformationSpec) -> Result<Vec<u8>, TransformError> {
    let decoded = decode(source)?;
    let transformed = transform(decoded, spec)?;
    encode(&transformed, spec.output_format())
}

/// Runs the pixel pipeline without decoding or encoding.
/// Order: resize → crop → rotate → grayscale → sepia.
pub fn transform(mut img: DynamicImage, spec: &TransformationSpec) -> Result<DynamicImage, TransformError> {
    if let Some(resize) = &spec.resize {
        img = resize_exact(&img, resize)?;
    }

    if let Some(crop) = &spec.crop {
        img = crop_checked(&img, crop)?;
    }

    if let Some(degrees) = spec.rotate {
        img = geometry::rotate(img, degrees)?;
    }

    if spec.grayscale() {
        img = filters::grayscale(&img);
    }

    if spec.sepia() {
        img = filters::sepia(&img);
    }

    Ok(img)
}

pub fn decode(source: &[u8]) -> Result<DynamicImage, TransformError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);

    let mut reader = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| TransformError::new(format!("unreadable source image: {}", e)))?;

    if reader.format().is_none() {
        return Err(TransformError::new("unreadable source image: unknown format"));
    }

    reader.limits(limits);
    reader
        .decode()
        .map_err(|e| TransformError::new(format!("corrupt source image: {}", e)))
}

pub fn encode(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, TransformError> {
    let prepared = prepare_for_encoding(img, format);
    let mut buffer = Cursor::new(Vec::new());

    prepared
        .write_to(&mut buffer, format.image_format())
        .map_err(|e| TransformError::new(format!("{} encoding failed: {}", format, e)))?;

    Ok(buffer.into_inner())
}

fn resize_exact(img: &DynamicImage, resize: &ResizeOptions) -> Result<DynamicImage, TransformError> {
    if resize.width == 0 || resize.height == 0 {
        return Err(TransformError::new("resize dimensions must be non-zero"));
    }
    Ok(img.resize_exact(resize.width, resize.height, FilterType::Nearest))
}

/// Out-of-bounds rectangles are rejected rather than clamped.
fn crop_checked(img: &DynamicImage, crop: &CropOptions) -> Result<DynamicImage, TransformError> {
    if crop.width == 0 || crop.height == 0 {
        return Err(TransformError::new("crop dimensions must be non-zero"));
    }

    let (img_w, img_h) = (img.width(), img.height());
    let right = u64::from(crop.x) + u64::from(crop.width);
    let bottom = u64::from(crop.y) + u64::from(crop.height);

    if right > u64::from(img_w) || bottom > u64::from(img_h) {
        return Err(TransformError::new(format!(
            "crop area ({},{} {}x{}) exceeds image bounds ({}x{})",
            crop.x, crop.y, crop.width, crop.height, img_w, img_h
        )));
    }

    Ok(img.crop_imm(crop.x, crop.y, crop.width, crop.height))
}

/// Converts the buffer to a colour type the target encoder accepts.
pub fn prepare_for_encoding(img: &DynamicImage, format: OutputFormat) -> DynamicImage {
    use image::ColorType;

    let color = img.color();
    let is_gray = matches!(color, ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16);

    match format {
        // JPEG has no alpha channel and only 8-bit samples.
        OutputFormat::Jpeg => match color {
            ColorType::L8 | ColorType::Rgb8 => img.clone(),
            _ if is_gray => DynamicImage::ImageLuma8(img.to_luma8()),
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        },
        OutputFormat::Png => match color {
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => img.clone(),
            ColorType::L16 => DynamicImage::ImageLuma8(img.to_luma8()),
            ColorType::La16 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
            _ if color.has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        },
        OutputFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8()),
        OutputFormat::WebP | OutputFormat::Bmp => {
            if color.has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            }
        }
    }
}
