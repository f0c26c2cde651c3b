pub mod database;
pub mod models;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::error::AppResult;
use crate::llm::media::ImageBlob;
use crate::utils::http::get_http_client;
use models::CharacterRecord;

/// Whole-record access to the saved characters.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Id and timestamp are assigned by the store.
    async fn create(&self, name: &str, image: &ImageBlob) -> AppResult<CharacterRecord>;

    /// Newest first.
    async fn list(&self) -> AppResult<Vec<CharacterRecord>>;

    async fn delete(&self, id: &str) -> AppResult<()>;

    async fn health_check(&self) -> AppResult<()>;
}

pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn CharacterStore>> {
    let store: Arc<dyn CharacterStore> = match config.store_backend {
        StoreBackend::Sqlite => Arc::new(database::Database::init(&config.database_url).await?),
        StoreBackend::Supabase => Arc::new(supabase::SupabaseStore::new(
            &config.supabase_url,
            &config.supabase_key,
            get_http_client().clone(),
        )),
    };
    info!("Character store ready (backend={})", store.backend());
    Ok(store)
}
