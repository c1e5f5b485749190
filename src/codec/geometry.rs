//! Rotation. Angles are degrees, positive is counter-clockwise.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::entities::transformation::MAX_DIMENSION;
use crate::errors::TransformError;

const EPSILON: f64 = 1e-9;

pub fn rotate(img: DynamicImage, degrees: i32) -> Result<DynamicImage, TransformError> {
    match degrees.rem_euclid(360) {
        0 => Ok(img),
        // `image` turns clockwise.
        90 => Ok(img.rotate270()),
        180 => Ok(img.rotate180()),
        270 => Ok(img.rotate90()),
        angle => rotate_expand(&img, f64::from(angle)),
    }
}

/// Canvas that fully contains a `width`x`height` image rotated by `degrees`.
pub fn expanded_size(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (f64::from(width), f64::from(height));

    let new_w = (w * cos.abs() + h * sin.abs() - EPSILON).ceil().max(1.0);
    let new_h = (w * sin.abs() + h * cos.abs() - EPSILON).ceil().max(1.0);
    (new_w as u32, new_h as u32)
}

/// [`expanded_size`], refused when either side would exceed [`MAX_DIMENSION`].
pub fn checked_canvas(width: u32, height: u32, degrees: f64) -> Result<(u32, u32), TransformError> {
    let (new_w, new_h) = expanded_size(width, height, degrees);
    if new_w > MAX_DIMENSION || new_h > MAX_DIMENSION {
        return Err(TransformError::new(format!(
            "rotated canvas ({}x{}) exceeds the {}px limit",
            new_w, new_h, MAX_DIMENSION
        )));
    }
    Ok((new_w, new_h))
}

/// Arbitrary-angle rotation on an expanded canvas. Uncovered corners are
/// transparent; sampling is nearest-neighbour on pixel centres.
pub fn rotate_expand(img: &DynamicImage, degrees: f64) -> Result<DynamicImage, TransformError> {
    let (dst_w, dst_h) = checked_canvas(img.width(), img.height(), degrees)?;
    let src = img.to_rgba8();
    let (src_w, src_h) = src.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();

    let (src_cx, src_cy) = (f64::from(src_w) / 2.0, f64::from(src_h) / 2.0);
    let (dst_cx, dst_cy) = (f64::from(dst_w) / 2.0, f64::from(dst_h) / 2.0);

    let out = RgbaImage::from_fn(dst_w, dst_h, |x, y| {
        let dx = f64::from(x) + 0.5 - dst_cx;
        let dy = f64::from(y) + 0.5 - dst_cy;

        let sx = (src_cx + dx * cos - dy * sin).floor();
        let sy = (src_cy + dx * sin + dy * cos).floor();

        if sx >= 0.0 && sy >= 0.0 && sx < f64::from(src_w) && sy < f64::from(src_h) {
            *src.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    });

    Ok(DynamicImage::ImageRgba8(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn marked(width: u32, height: u32) -> DynamicImage {
        // Top-left pixel red, everything else black.
        let mut img = RgbImage::new(width, height);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn quarter_turn_is_counter_clockwise() {
        let out = rotate(marked(4, 2), 90).unwrap();
        assert_eq!(out.dimensions(), (2, 4));
        // Top-left moves to bottom-left.
        assert_eq!(out.to_rgb8().get_pixel(0, 3).0, [255, 0, 0]);
    }

    #[test]
    fn negative_quarter_turn_is_clockwise() {
        let out = rotate(marked(4, 2), -90).unwrap();
        // Top-left moves to top-right.
        assert_eq!(out.to_rgb8().get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn full_turns_are_identity() {
        let img = marked(3, 5);
        assert_eq!(rotate(img.clone(), 360).unwrap(), img);
        assert_eq!(rotate(img.clone(), -720).unwrap(), img);
    }

    #[test]
    fn forty_five_degrees_expands_canvas() {
        assert_eq!(expanded_size(100, 100, 45.0), (142, 142));
        let out = rotate(marked(10, 10), 45).unwrap();
        assert_eq!(out.dimensions(), (15, 15));
        assert_eq!(out.color(), image::ColorType::Rgba8);
        // Corners of the expanded canvas are not covered by the source.
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn expanded_size_matches_quarter_turn() {
        assert_eq!(expanded_size(40, 10, 90.0), (10, 40));
    }

    #[test]
    fn oversized_rotated_canvas_is_refused() {
        assert_eq!(checked_canvas(100, 100, 45.0).unwrap(), (142, 142));

        let err = checked_canvas(MAX_DIMENSION, MAX_DIMENSION, 30.0).unwrap_err();
        assert!(err.to_string().contains("exceeds the 16384px limit"));
        assert!(checked_canvas(MAX_DIMENSION, 4000, 10.0).is_err());
    }
}
