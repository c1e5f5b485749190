use std::{fmt, str::FromStr};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use validator::Validate;

// ───── Constants ──────────────────────────────────────────────────────
pub const MAX_DIMENSION: u32 = 16_384;

// ───── Request Models ────────────────────────────────────────────────

/// Requested edits for a derived image. Every field is optional and they
/// combine freely; the codec always applies them in the order
/// resize → crop → rotate → grayscale → sepia → encode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct TransformationSpec {
    #[validate(nested)]
    #[serde(default)]
    pub resize: Option<ResizeOptions>,

    #[validate(nested)]
    #[serde(default)]
    pub crop: Option<CropOptions>,

    /// Degrees, counter-clockwise. The canvas grows to fit the rotated image.
    #[serde(default)]
    pub rotate: Option<i32>,

    #[serde(default)]
    pub format: Option<OutputFormat>,

    #[serde(default)]
    pub filters: Option<FilterOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ResizeOptions {
    #[validate(range(min = 1, max = MAX_DIMENSION, message = "Width must be between 1 and 16384"))]
    pub width: u32,

    #[validate(range(min = 1, max = MAX_DIMENSION, message = "Height must be between 1 and 16384"))]
    pub height: u32,
}

/// Rectangle in source pixel coordinates, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CropOptions {
    pub x: u32,
    pub y: u32,

    #[validate(range(min = 1, max = MAX_DIMENSION, message = "Width must be between 1 and 16384"))]
    pub width: u32,

    #[validate(range(min = 1, max = MAX_DIMENSION, message = "Height must be between 1 and 16384"))]
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub grayscale: bool,

    #[serde(default)]
    pub sepia: bool,
}

impl TransformationSpec {
    pub fn output_format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    pub fn grayscale(&self) -> bool {
        self.filters.is_some_and(|f| f.grayscale)
    }

    pub fn sepia(&self) -> bool {
        self.filters.is_some_and(|f| f.sepia)
    }
}

// ───── Output Format ─────────────────────────────────────────────────

/// Encodings a derived image may be written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::WebP,
        OutputFormat::Gif,
        OutputFormat::Bmp,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Gif => "gif",
            OutputFormat::Bmp => "bmp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Bmp => "image/bmp",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "gif" => Ok(OutputFormat::Gif),
            "bmp" => Ok(OutputFormat::Bmp),
            other => Err(format!(
                "unsupported format '{}', expected one of: jpeg, png, webp, gif, bmp",
                other
            )),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.extension().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_defaults_to_jpeg_without_edits() {
        let spec: TransformationSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, TransformationSpec::default());
        assert_eq!(spec.output_format(), OutputFormat::Jpeg);
        assert!(!spec.grayscale());
        assert!(!spec.sepia());
    }

    #[test]
    fn format_is_case_insensitive_and_accepts_jpg() {
        let spec: TransformationSpec = serde_json::from_str(r#"{"format":"JPG"}"#).unwrap();
        assert_eq!(spec.output_format(), OutputFormat::Jpeg);
        let spec: TransformationSpec = serde_json::from_str(r#"{"format":"Png"}"#).unwrap();
        assert_eq!(spec.output_format(), OutputFormat::Png);
    }

    #[test]
    fn unknown_format_is_a_type_error() {
        let result = serde_json::from_str::<TransformationSpec>(r#"{"format":"tiff"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn negative_crop_origin_is_a_type_error() {
        let result = serde_json::from_str::<TransformationSpec>(
            r#"{"crop":{"x":-1,"y":0,"width":10,"height":10}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_sized_resize_fails_validation() {
        let spec: TransformationSpec =
            serde_json::from_str(r#"{"resize":{"width":0,"height":10}}"#).unwrap();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn oversized_crop_fails_validation() {
        let spec = TransformationSpec {
            crop: Some(CropOptions { x: 0, y: 0, width: MAX_DIMENSION + 1, height: 1 }),
            ..Default::default()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn filters_default_to_false_when_partially_given() {
        let spec: TransformationSpec =
            serde_json::from_str(r#"{"filters":{"sepia":true}}"#).unwrap();
        assert!(spec.sepia());
        assert!(!spec.grayscale());
    }

    #[test]
    fn format_serializes_as_extension() {
        let spec = TransformationSpec { format: Some(OutputFormat::WebP), ..Default::default() };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["format"], "webp");
    }
}
