use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const PNG_MIME_TYPE: &str = "image/png";

static DATA_URI_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/[\w.+-]+;base64,").expect("valid data URI regex"));

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Removes a leading `data:image/...;base64,` header, if any.
pub fn strip_data_uri_prefix(value: &str) -> &str {
    let trimmed = value.trim();
    match DATA_URI_PREFIX.find(trimmed) {
        Some(found) => &trimmed[found.end()..],
        None => trimmed,
    }
}

fn declared_mime_type(value: &str) -> Option<String> {
    let rest = value.trim().strip_prefix("data:")?;
    let (mime_type, _) = rest.split_once(";base64,")?;
    Some(mime_type.to_ascii_lowercase())
}

/// Encoded image bytes with the MIME type they were declared (or sniffed) as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, PNG_MIME_TYPE)
    }

    /// Accepts a data URI or a bare base64 payload.
    pub fn from_data_uri(value: &str) -> AppResult<Self> {
        let payload = strip_data_uri_prefix(value);
        if payload.is_empty() {
            return Err(AppError::validation("Image payload is empty"));
        }
        let bytes = general_purpose::STANDARD.decode(payload)?;
        Ok(Self::from_bytes(bytes, declared_mime_type(value)))
    }

    pub fn from_base64(payload: &str, mime_type: Option<&str>) -> AppResult<Self> {
        let bytes = general_purpose::STANDARD.decode(payload.trim())?;
        Ok(Self::from_bytes(bytes, mime_type.map(str::to_string)))
    }

    fn from_bytes(bytes: Vec<u8>, declared: Option<String>) -> Self {
        let mime_type = declared
            .or_else(|| detect_mime_type(&bytes))
            .unwrap_or_else(|| PNG_MIME_TYPE.to_string());
        Self { bytes, mime_type }
    }

    #[cfg(test)]
    pub fn is_png(&self) -> bool {
        self.mime_type == PNG_MIME_TYPE
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}
