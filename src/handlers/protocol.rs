//! JSON bodies exchanged with the browser client.

use serde::{Deserialize, Serialize};

use crate::db::models::CharacterRecord;
use crate::error::{AppError, AppResult};

fn required<'a>(value: Option<&'a str>, message: &str) -> AppResult<&'a str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation(message))
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl PromptRequest {
    pub fn prompt(&self) -> AppResult<&str> {
        required(self.prompt.as_deref(), "Prompt is required")
    }
}

/// `baseImage` has been sent both as a single data URI and as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    #[serde(default)]
    pub base_images: Option<Vec<String>>,
    #[serde(default)]
    pub base_image: Option<OneOrMany>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub character_names: Option<Vec<String>>,
}

impl ComposeRequest {
    /// `baseImages` wins over the legacy `baseImage`. A blank entry is
    /// rejected rather than dropped so `characterNames` stays index-aligned.
    pub fn take_image_sources(&mut self) -> AppResult<Vec<String>> {
        let sources = match self.base_images.take() {
            Some(images) if !images.is_empty() => images,
            _ => self
                .base_image
                .take()
                .map(OneOrMany::into_vec)
                .unwrap_or_default(),
        };
        if sources.is_empty() {
            return Err(AppError::validation("Base image is required"));
        }
        if let Some(index) = sources.iter().position(|source| source.trim().is_empty()) {
            return Err(AppError::validation(format!(
                "Base image {} is empty",
                index + 1
            )));
        }
        Ok(sources)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationRequest {
    #[serde(default)]
    pub base_image: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl VariationRequest {
    pub fn base_image(&self) -> AppResult<&str> {
        required(self.base_image.as_deref(), "Base image is required")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRequest {
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub character_name: Option<String>,
}

impl LabelRequest {
    pub fn fields(&self) -> AppResult<(&str, &str)> {
        let message = "Missing required fields: imageData and characterName";
        Ok((
            required(self.image_data.as_deref(), message)?,
            required(self.character_name.as_deref(), message)?,
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCharacterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
}

impl NewCharacterRequest {
    pub fn fields(&self) -> AppResult<(&str, &str)> {
        let message = "Missing required fields: name and imageData";
        Ok((
            required(self.name.as_deref(), message)?,
            required(self.image_data.as_deref(), message)?,
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CharactersResponse {
    pub characters: Vec<CharacterRecord>,
}

#[derive(Debug, Serialize)]
pub struct CharacterResponse {
    pub character: CharacterRecord,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
