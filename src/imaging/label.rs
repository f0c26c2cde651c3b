//! Stamps a character name onto a portrait: a translucent dark band across
//! the top of the frame with the name in white bold text.

use std::sync::Arc;

use image::codecs::png::CompressionType;
use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use resvg::tiny_skia;
use resvg::usvg;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::imaging::{decode, encode_png};
use crate::llm::media::ImageBlob;

pub const BAND_HEIGHT: u32 = 40;
pub const FALLBACK_FRAME: (u32, u32) = (384, 384);
const TEXT_INSET_X: u32 = 10;
const TEXT_BASELINE_Y: u32 = 30;
const FONT_SIZE: u32 = 24;
const FONT_FAMILIES: &str = "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif";

static FONT_DB: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    let has_generic_sans = db
        .query(&usvg::fontdb::Query {
            families: &[usvg::fontdb::Family::SansSerif],
            ..Default::default()
        })
        .is_some();
    if !has_generic_sans {
        let fallback = db
            .faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()));
        match fallback {
            Some(family) => db.set_sans_serif_family(family),
            None => warn!("No system fonts found; portrait labels will render without text"),
        }
    }

    debug!("Label font database loaded with {} faces", db.len());
    Arc::new(db)
});

pub fn fonts_available() -> bool {
    !FONT_DB.is_empty()
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn band_svg(width: u32, height: u32, label: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><rect x="0" y="0" width="{width}" height="{BAND_HEIGHT}" fill="rgb(0,0,0)" fill-opacity="0.5"/><text x="{TEXT_INSET_X}" y="{TEXT_BASELINE_Y}" fill="white" font-family="{FONT_FAMILIES}" font-size="{FONT_SIZE}" font-weight="bold" xml:space="preserve">{}</text></svg>"#,
        escape_xml(label)
    )
}

fn frame_dimensions(image: &RgbaImage) -> (u32, u32) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        FALLBACK_FRAME
    } else {
        (width, height)
    }
}

/// Renders the band straight onto the top rows of `canvas`. Blending happens
/// in premultiplied space on a pixmap seeded from the canvas, so opaque
/// pixels stay opaque.
fn stamp_band(canvas: &mut RgbaImage, label: &str) -> AppResult<()> {
    let (width, height) = canvas.dimensions();
    let band_height = BAND_HEIGHT.min(height);

    let options = usvg::Options {
        fontdb: FONT_DB.clone(),
        ..Default::default()
    };
    let svg = band_svg(width, band_height, label);
    let tree = usvg::Tree::from_str(&svg, &options)
        .map_err(|err| AppError::upstream(format!("Failed to build label overlay: {err}")))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, band_height).ok_or_else(|| {
        AppError::upstream(format!("Invalid label canvas {width}x{band_height}"))
    })?;
    for (target, source) in pixmap.pixels_mut().iter_mut().zip(canvas.pixels()) {
        let [red, green, blue, alpha] = source.0;
        *target = tiny_skia::ColorU8::from_rgba(red, green, blue, alpha).premultiply();
    }

    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // Row-major order: the first `width * band_height` canvas pixels are the band.
    for (target, source) in canvas.pixels_mut().zip(pixmap.pixels()) {
        let color = source.demultiply();
        *target = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Ok(())
}

/// Draws `label` onto the top band of `image` and returns the result as PNG.
/// The frame size of the input is preserved.
pub fn overlay_label(image: &ImageBlob, label: &str) -> AppResult<ImageBlob> {
    let mut canvas = decode(image)?.to_rgba8();
    let (width, height) = frame_dimensions(&canvas);
    if canvas.dimensions() != (width, height) {
        canvas = RgbaImage::new(width, height);
    }

    stamp_band(&mut canvas, label)?;

    encode_png(
        &image::DynamicImage::ImageRgba8(canvas),
        CompressionType::Default,
    )
}
