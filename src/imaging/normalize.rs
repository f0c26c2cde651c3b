use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::config::FrameBox;
use crate::error::AppResult;
use crate::imaging::{compression_for_quality, decode, encode_png};
use crate::llm::media::ImageBlob;

/// Size of `source` scaled to fit inside `frame` with its aspect ratio kept.
pub fn contain_size(source: (u32, u32), frame: FrameBox) -> (u32, u32) {
    let (width, height) = source;
    if width == 0 || height == 0 {
        return (frame.width, frame.height);
    }
    let scale = f64::min(
        frame.width as f64 / width as f64,
        frame.height as f64 / height as f64,
    );
    let fitted_width = ((width as f64 * scale).round() as u32).clamp(1, frame.width);
    let fitted_height = ((height as f64 * scale).round() as u32).clamp(1, frame.height);
    (fitted_width, fitted_height)
}

fn contain(image: DynamicImage, frame: FrameBox) -> RgbaImage {
    let source = image.to_rgba8();
    if source.dimensions() == (frame.width, frame.height) {
        return source;
    }

    let (fitted_width, fitted_height) = contain_size(source.dimensions(), frame);
    let resized = imageops::resize(&source, fitted_width, fitted_height, FilterType::Lanczos3);

    let mut canvas = RgbaImage::new(frame.width, frame.height);
    let offset_x = (frame.width - fitted_width) / 2;
    let offset_y = (frame.height - fitted_height) / 2;
    imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);
    canvas
}

/// Fits `image` into `frame` without cropping, padding with transparent
/// pixels, and re-encodes it as PNG.
pub fn normalize_to_frame(image: &ImageBlob, frame: FrameBox, quality: u8) -> AppResult<ImageBlob> {
    let decoded = decode(image)?;
    let framed = contain(decoded, frame);
    encode_png(
        &DynamicImage::ImageRgba8(framed),
        compression_for_quality(quality),
    )
}
