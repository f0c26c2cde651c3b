pub mod label;
pub mod normalize;

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

use crate::error::AppResult;
use crate::llm::media::ImageBlob;

pub use label::overlay_label;
pub use normalize::normalize_to_frame;

pub fn decode(blob: &ImageBlob) -> AppResult<DynamicImage> {
    let image = image::ImageReader::new(Cursor::new(&blob.bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;
    Ok(image)
}

/// PNG is lossless, so the quality factor only chooses how hard the encoder
/// works to shrink the output.
pub fn compression_for_quality(quality: u8) -> CompressionType {
    match quality {
        0..=89 => CompressionType::Best,
        90..=99 => CompressionType::Default,
        _ => CompressionType::Fast,
    }
}

pub fn encode_png(image: &DynamicImage, compression: CompressionType) -> AppResult<ImageBlob> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut bytes, compression, FilterType::Adaptive);
    image.write_with_encoder(encoder)?;
    Ok(ImageBlob::png(bytes))
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{DynamicImage, Rgba, RgbaImage};

    use super::*;

    pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> ImageBlob {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        encode_png(&DynamicImage::ImageRgba8(image), CompressionType::Fast)
            .expect("encode test png")
    }

    pub fn dimensions(blob: &ImageBlob) -> (u32, u32) {
        let image = decode(blob).expect("decode test png");
        (image.width(), image.height())
    }
}
