use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::llm::media::ImageBlob;
use crate::llm::{ContentPart, ImageGenerator};
use crate::utils::http::{summarize_error_body, truncate_for_log};
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub aspect_ratio: String,
}

impl GeminiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_image_model.clone(),
            base_url: config.gemini_api_base_url.clone(),
            aspect_ratio: config.generation_aspect_ratio.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    settings: GeminiSettings,
    http: Client,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings, http: Client) -> Self {
        Self { settings, http }
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        )
    }

    async fn call_gemini_api(&self, payload: Value) -> AppResult<GeminiResponse> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                target: "llm.gemini",
                model = %self.settings.model,
                payload = %summarize_gemini_payload(&payload)
            );
        }

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                AppError::upstream(format!("Gemini request failed: {err_text}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body = self.redact_api_key(&body);
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(AppError::upstream(format!(
                "Gemini request failed with status {status}: {detail}"
            )));
        }

        let value = response.json::<GeminiResponse>().await.map_err(|err| {
            AppError::upstream(format!(
                "Gemini response could not be parsed: {}",
                self.redact_api_key(&err.to_string())
            ))
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                target: "llm.gemini",
                model = %self.settings.model,
                response = %summarize_gemini_response(&value)
            );
        }
        Ok(value)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    fn aspect_ratio(&self) -> &str {
        &self.settings.aspect_ratio
    }

    async fn generate(&self, parts: Vec<ContentPart>) -> AppResult<ImageBlob> {
        if self.settings.api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }

        let image_count = parts
            .iter()
            .filter(|part| matches!(part, ContentPart::Image(_)))
            .count();
        info!(
            "Sending Gemini request with {} content parts ({} images)",
            parts.len(),
            image_count
        );

        let payload = build_payload(&parts);
        let model = self.settings.model.clone();
        let operation = if image_count == 0 {
            "generate_from_text"
        } else {
            "generate_from_images"
        };
        log_llm_timing(
            "gemini",
            &model,
            operation,
            Some(json!({ "parts": parts.len(), "images": image_count })),
            || async {
                let response = self.call_gemini_api(payload).await?;
                extract_first_image(response, &model)
            },
        )
        .await
    }
}

fn build_gemini_parts(parts: &[ContentPart]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "text": text }),
            ContentPart::Image(image) => json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.to_base64()
                }
            }),
        })
        .collect()
}

fn build_payload(parts: &[ContentPart]) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": build_gemini_parts(parts) }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"]
        },
    })
}

/// First image part in response order wins; text parts are only logged.
fn extract_first_image(response: GeminiResponse, model: &str) -> AppResult<ImageBlob> {
    for candidate in response.candidates.unwrap_or_default() {
        let Some(parts) = candidate.content.and_then(|content| content.parts) else {
            continue;
        };
        for part in parts {
            match part {
                GeminiPart::Text { text } => {
                    if !text.trim().is_empty() {
                        info!("Text part from Gemini: {}", truncate_for_log(&text, 500));
                    }
                }
                GeminiPart::InlineData { inline_data } => {
                    if !inline_data.mime_type.starts_with("image/") {
                        continue;
                    }
                    if inline_data.data.trim().is_empty() {
                        warn!("Skipping Gemini image part without data (model: {})", model);
                        continue;
                    }
                    return ImageBlob::from_base64(
                        &inline_data.data,
                        Some(inline_data.mime_type.as_str()),
                    );
                }
                GeminiPart::Other(_) => {}
            }
        }
    }

    Err(AppError::EmptyResult(format!(
        "No images returned by Gemini (model: {model})"
    )))
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        let Some(parts) = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_ref())
        else {
            continue;
        };
        for part in parts {
            match part {
                GeminiPart::Text { text } => {
                    text_parts += 1;
                    if text_preview.is_none() && !text.trim().is_empty() {
                        text_preview = Some(truncate_for_log(text, 200));
                    }
                }
                GeminiPart::InlineData { inline_data } => {
                    if inline_data.mime_type.starts_with("image/") {
                        image_parts += 1;
                    }
                }
                GeminiPart::Other(_) => {}
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview
    })
}
