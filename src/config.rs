use std::env;
use std::fmt;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

/// Pixel box an image is fitted into before it is sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBox {
    pub width: u32,
    pub height: u32,
}

impl FrameBox {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parses `WIDTHxHEIGHT` (also accepts `*` or `,` as the separator).
    pub fn parse(value: &str) -> Option<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        let (width, height) = lowered
            .split_once('x')
            .or_else(|| lowered.split_once('*'))
            .or_else(|| lowered.split_once(','))?;
        let width = width.trim().parse::<u32>().ok()?;
        let height = height.trim().parse::<u32>().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }
}

impl fmt::Display for FrameBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Multi-image composition keeps each reference small to bound token cost.
pub const DEFAULT_COMPOSE_FRAME: FrameBox = FrameBox::new(384, 384);
pub const DEFAULT_VARIATION_FRAME: FrameBox = FrameBox::new(800, 1200);
pub const DEFAULT_PNG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Supabase,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "" => Some(StoreBackend::Sqlite),
            "supabase" => Some(StoreBackend::Supabase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub bind_address: String,
    pub body_limit_bytes: usize,
    pub http_timeout_seconds: u64,
    pub gemini_api_key: String,
    pub gemini_image_model: String,
    pub gemini_api_base_url: String,
    pub generation_aspect_ratio: String,
    pub compose_frame: FrameBox,
    pub variation_frame: FrameBox,
    pub png_quality: u8,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_key: String,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

/// `LOG_LEVEL` is needed before the rest of the configuration so that
/// warnings raised while loading it reach the log.
pub fn log_level_from(value: Option<String>) -> String {
    value
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u8(name: &str, default: u8) -> u8 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u8>().ok())
        .unwrap_or(default)
}

fn env_frame(name: &str, default: FrameBox) -> FrameBox {
    match env::var(name) {
        Ok(value) => FrameBox::parse(&value).unwrap_or_else(|| {
            warn!(
                "Invalid {} value '{}'; expected WIDTHxHEIGHT, using {}.",
                name, value, default
            );
            default
        }),
        Err(_) => default,
    }
}

fn normalize_database_url(value: String) -> String {
    if value.starts_with("sqlite+aiosqlite://") {
        return value.replacen("sqlite+aiosqlite://", "sqlite://", 1);
    }
    value
}

fn normalize_base_url(value: String) -> String {
    value.trim().trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let backend_raw = env_string("STORE_BACKEND", "sqlite");
        let store_backend = StoreBackend::parse(&backend_raw).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown STORE_BACKEND '{}'; expected 'sqlite' or 'supabase'",
                backend_raw
            )
        })?;

        let supabase_url = normalize_base_url(env_string("SUPABASE_URL", ""));
        let supabase_key = env_string("SUPABASE_KEY", "").trim().to_string();
        if store_backend == StoreBackend::Supabase
            && (supabase_url.is_empty() || supabase_key.is_empty())
        {
            return Err(anyhow::anyhow!(
                "SUPABASE_URL and SUPABASE_KEY are required when STORE_BACKEND=supabase"
            ));
        }

        let png_quality = env_u8("PNG_QUALITY", DEFAULT_PNG_QUALITY).min(100);

        Ok(Config {
            log_level: log_level_from(env::var("LOG_LEVEL").ok()),
            bind_address: env_string("BIND_ADDRESS", "127.0.0.1:3000"),
            body_limit_bytes: env_usize("BODY_LIMIT_MB", 20).max(1) * 1024 * 1024,
            http_timeout_seconds: env_u64("HTTP_TIMEOUT_SECONDS", 120).max(1),
            gemini_api_key: env_string("GEMINI_API_KEY", "").trim().to_string(),
            gemini_image_model: env_string(
                "GEMINI_IMAGE_MODEL",
                "gemini-2.0-flash-exp-image-generation",
            ),
            gemini_api_base_url: normalize_base_url(env_string(
                "GEMINI_API_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            )),
            generation_aspect_ratio: env_string("GENERATION_ASPECT_RATIO", "16:9"),
            compose_frame: env_frame("COMPOSE_FRAME", DEFAULT_COMPOSE_FRAME),
            variation_frame: env_frame("VARIATION_FRAME", DEFAULT_VARIATION_FRAME),
            png_quality,
            store_backend,
            database_url: normalize_database_url(env_string(
                "DATABASE_URL",
                "sqlite://studio.db",
            )),
            supabase_url,
            supabase_key,
        })
    }
}
