//! Reference-image composition: every input image is labelled with its
//! character name, fitted into the compose frame and sent upstream as one
//! ordered multi-part request.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::config::{Config, FrameBox};
use crate::error::{AppError, AppResult};
use crate::imaging::{normalize_to_frame, overlay_label};
use crate::llm::media::ImageBlob;
use crate::llm::ImageGenerator;

#[derive(Debug, Clone, Copy)]
pub struct FramePolicy {
    pub compose_frame: FrameBox,
    pub variation_frame: FrameBox,
    pub png_quality: u8,
}

impl FramePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            compose_frame: config.compose_frame,
            variation_frame: config.variation_frame,
            png_quality: config.png_quality,
        }
    }
}

pub fn default_name(index: usize) -> String {
    format!("Character {}", index + 1)
}

/// One name per image. Missing names are synthesized; blank entries fall
/// back to the synthesized name for their slot.
pub fn derive_names(image_count: usize, names: Option<Vec<String>>) -> AppResult<Vec<String>> {
    let names = names.unwrap_or_default();
    if names.is_empty() {
        return Ok((0..image_count).map(default_name).collect());
    }
    if names.len() != image_count {
        return Err(AppError::validation(format!(
            "Expected {} character names for {} images, got {}",
            image_count,
            image_count,
            names.len()
        )));
    }
    Ok(names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                default_name(index)
            } else {
                trimmed.to_string()
            }
        })
        .collect())
}

/// Label first, then fit: the label is drawn on the source canvas and
/// scales together with the portrait.
pub fn prepare_reference(
    image: &ImageBlob,
    name: &str,
    frame: FrameBox,
    png_quality: u8,
) -> AppResult<ImageBlob> {
    let labelled = overlay_label(image, name)?;
    normalize_to_frame(&labelled, frame, png_quality)
}

#[derive(Clone)]
pub struct CompositionPipeline {
    generator: Arc<dyn ImageGenerator>,
    frames: FramePolicy,
}

impl CompositionPipeline {
    pub fn new(generator: Arc<dyn ImageGenerator>, frames: FramePolicy) -> Self {
        Self { generator, frames }
    }

    pub fn generator(&self) -> &Arc<dyn ImageGenerator> {
        &self.generator
    }

    async fn prepare_references(
        &self,
        images: Vec<ImageBlob>,
        names: &[String],
    ) -> AppResult<Vec<ImageBlob>> {
        let total = images.len();
        let frame = self.frames.compose_frame;
        let quality = self.frames.png_quality;

        let tasks = images
            .into_iter()
            .zip(names.iter().cloned())
            .enumerate()
            .map(|(index, (image, name))| async move {
                debug!(
                    "Processing base image {}/{} for character {}",
                    index + 1,
                    total,
                    name
                );
                tokio::task::spawn_blocking(move || {
                    prepare_reference(&image, &name, frame, quality)
                })
                .await?
            });

        try_join_all(tasks).await
    }

    pub async fn compose_from_images(
        &self,
        images: Vec<ImageBlob>,
        prompt: Option<&str>,
        names: Option<Vec<String>>,
    ) -> AppResult<ImageBlob> {
        if images.is_empty() {
            return Err(AppError::validation("Base image is required"));
        }

        let names = derive_names(images.len(), names)?;
        info!(
            "Composing from {} base image(s) for characters: {}",
            images.len(),
            names.join(", ")
        );

        let processed = self.prepare_references(images, &names).await?;
        info!(
            "All {} images processed into {} frames",
            processed.len(),
            self.frames.compose_frame
        );

        self.generator.generate_from_images(processed, prompt).await
    }

    /// Fits the image into the variation frame once (no label) and asks for
    /// `count` independent variations of it. Any failed call fails the batch.
    pub async fn variations(
        &self,
        image: ImageBlob,
        prompt: Option<&str>,
        count: usize,
    ) -> AppResult<Vec<ImageBlob>> {
        let frame = self.frames.variation_frame;
        let quality = self.frames.png_quality;
        let normalized =
            tokio::task::spawn_blocking(move || normalize_to_frame(&image, frame, quality))
                .await??;
        debug!("Requesting {} variation(s) in a {} frame", count, frame);

        let generator = &self.generator;
        let calls = (0..count)
            .map(|_| generator.generate_from_images(vec![normalized.clone()], prompt));
        try_join_all(calls).await
    }

    pub async fn label(&self, image: ImageBlob, name: String) -> AppResult<ImageBlob> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("Character name is required"));
        }
        tokio::task::spawn_blocking(move || overlay_label(&image, &name)).await?
    }
}
