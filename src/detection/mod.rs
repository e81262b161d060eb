//! Face counting. Images are decoded and reduced to grayscale here; the
//! counting itself sits behind [`FaceDetector`] so handlers never care which
//! model is loaded.

mod cascade;
mod grouping;
mod haar;
mod integral;

use std::io::Cursor;

use image::GrayImage;
use serde::Serialize;

pub use cascade::{Cascade, CascadeError};
pub use grouping::{GROUP_EPS, group_rectangles};
pub use haar::{DetectorParams, HaarDetector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Vec<FaceRect>;
}

/// Decodes any supported container format and converts to 8-bit luma with
/// the BT.601 weights. Images wider or taller than `max_dimension` fail with
/// [`image::ImageError::Limits`] before any pixel buffer is allocated.
pub fn decode_grayscale(bytes: &[u8], max_dimension: u32) -> Result<GrayImage, image::ImageError> {
    let mut reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut limits = image::Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    reader.limits(limits);

    let rgb = reader.decode()?.to_rgb8();
    Ok(GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        image::Luma([luma.round().clamp(0.0, 255.0) as u8])
    }))
}
