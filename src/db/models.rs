use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::error::{AppError, AppResult};
use crate::llm::media::ImageBlob;

/// A saved character. `image_data` is the base64-encoded PNG as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(deserialize_with = "deserialize_opaque_id")]
    pub id: String,
    pub name: String,
    pub image_data: String,
    pub created_at: DateTime<Utc>,
}

impl CharacterRecord {
    #[cfg(test)]
    pub fn image(&self) -> AppResult<ImageBlob> {
        ImageBlob::from_base64(&self.image_data, Some(crate::llm::media::PNG_MIME_TYPE))
    }
}

/// Remote stores hand out either numeric or textual keys.
fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unsupported character id: {other}"
        ))),
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CharacterRow {
    pub id: i64,
    pub name: String,
    pub image_data: String,
    pub created_at: DateTime<Utc>,
}

impl From<CharacterRow> for CharacterRecord {
    fn from(row: CharacterRow) -> Self {
        CharacterRecord {
            id: row.id.to_string(),
            name: row.name,
            image_data: row.image_data,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterInsert {
    pub name: String,
    pub image_data: String,
}

impl CharacterInsert {
    pub fn new(name: &str, image: &ImageBlob) -> AppResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Character name is required"));
        }
        if image.bytes.is_empty() {
            return Err(AppError::validation("Character image is required"));
        }
        Ok(Self {
            name: name.to_string(),
            image_data: image.to_base64(),
        })
    }
}
