//! Colour filters. Both keep an alpha channel when the input has one.

use image::{DynamicImage, GrayAlphaImage, GrayImage, LumaA, Rgb, RgbImage, Rgba, RgbaImage};

const SEPIA: [[f64; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// ITU-R 601-2 luma in 16.16 fixed point, rounded to nearest.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let l = (u32::from(r) * 19_595 + u32::from(g) * 38_470 + u32::from(b) * 7_471 + 0x8000) >> 16;
    l.min(255) as u8
}

pub fn sepia_pixel([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    let channel = |row: [f64; 3]| -> u8 {
        (row[0] * r + row[1] * g + row[2] * b).round().clamp(0.0, 255.0) as u8
    };
    [channel(SEPIA[0]), channel(SEPIA[1]), channel(SEPIA[2])]
}

pub fn grayscale(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let out = GrayAlphaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            LumaA([luma(r, g, b), a])
        });
        DynamicImage::ImageLumaA8(out)
    } else {
        let rgb = img.to_rgb8();
        let out = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
            image::Luma([luma(r, g, b)])
        });
        DynamicImage::ImageLuma8(out)
    }
}

pub fn sepia(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        let mut rgba: RgbaImage = img.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b] = sepia_pixel([pixel[0], pixel[1], pixel[2]]);
            *pixel = Rgba([r, g, b, pixel[3]]);
        }
        DynamicImage::ImageRgba8(rgba)
    } else {
        let mut rgb: RgbImage = img.to_rgb8();
        for pixel in rgb.pixels_mut() {
            *pixel = Rgb(sepia_pixel(pixel.0));
        }
        DynamicImage::ImageRgb8(rgb)
    }
}
