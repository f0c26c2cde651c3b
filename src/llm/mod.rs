pub mod gemini;
pub mod media;

use async_trait::async_trait;

use crate::error::AppResult;
use media::ImageBlob;

pub use gemini::{GeminiClient, GeminiSettings};

/// Instruction used when an image request arrives without a prompt.
pub const DEFAULT_VARIATION_PROMPT: &str = "Generate a variation of this image that maintains the same style and subject, with slight differences in pose, expression, or background. Preserve the original aspect ratio.";

/// One unit of a multi-part generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImageBlob),
}

impl ContentPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageBlob> {
        match self {
            ContentPart::Image(image) => Some(image),
            ContentPart::Text(_) => None,
        }
    }
}

pub fn text_prompt_with_suffix(prompt: &str, aspect_ratio: &str) -> String {
    format!(
        "{}. Please make sure the aspect ratio is {} and there is no text/characters in the image",
        prompt.trim(),
        aspect_ratio
    )
}

/// Text part first, then one image part per input image in input order.
pub fn image_request_parts(images: Vec<ImageBlob>, prompt: Option<&str>) -> Vec<ContentPart> {
    let prompt = prompt
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_VARIATION_PROMPT);
    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(ContentPart::Text(prompt.to_string()));
    parts.extend(images.into_iter().map(ContentPart::Image));
    parts
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Aspect ratio requested from text-only generations.
    fn aspect_ratio(&self) -> &str;

    /// Sends one ordered multi-part request and returns the first image the
    /// service answers with.
    async fn generate(&self, parts: Vec<ContentPart>) -> AppResult<ImageBlob>;

    async fn generate_from_text(&self, prompt: &str) -> AppResult<ImageBlob> {
        let prompt = text_prompt_with_suffix(prompt, self.aspect_ratio());
        self.generate(vec![ContentPart::Text(prompt)]).await
    }

    async fn generate_from_images(
        &self,
        images: Vec<ImageBlob>,
        prompt: Option<&str>,
    ) -> AppResult<ImageBlob> {
        self.generate(image_request_parts(images, prompt)).await
    }
}
