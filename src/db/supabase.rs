use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::db::models::{CharacterInsert, CharacterRecord};
use crate::db::CharacterStore;
use crate::error::{AppError, AppResult};
use crate::llm::media::ImageBlob;
use crate::utils::http::summarize_error_body;

const CHARACTERS_TABLE: &str = "characters";

/// Character table behind a Supabase (PostgREST) endpoint.
#[derive(Clone)]
pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    http: Client,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, CHARACTERS_TABLE)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, operation: &str, builder: RequestBuilder) -> AppResult<Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|err| AppError::upstream(format!("Supabase {operation} failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "Supabase {} error: status={}, body={}",
                operation, status, body_summary
            );
            let detail = message.unwrap_or(body_summary);
            return Err(AppError::upstream(format!(
                "Supabase {operation} failed with status {status}: {detail}"
            )));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> AppResult<T> {
        self.send(operation, builder)
            .await?
            .json::<T>()
            .await
            .map_err(|err| {
                AppError::upstream(format!("Supabase {operation} response was invalid: {err}"))
            })
    }
}

#[async_trait]
impl CharacterStore for SupabaseStore {
    fn backend(&self) -> &'static str {
        "supabase"
    }

    async fn create(&self, name: &str, image: &ImageBlob) -> AppResult<CharacterRecord> {
        let insert = CharacterInsert::new(name, image)?;
        let builder = self
            .http
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(&[insert]);
        let mut rows: Vec<CharacterRecord> = self.send_json("insert", builder).await?;
        if rows.is_empty() {
            return Err(AppError::upstream(
                "Supabase insert returned no rows".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn list(&self) -> AppResult<Vec<CharacterRecord>> {
        let builder = self
            .http
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.send_json("list", builder).await
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let builder = self
            .http
            .delete(self.table_url())
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id.trim()))]);
        let deleted: Vec<Value> = self.send_json("delete", builder).await?;
        if deleted.is_empty() {
            return Err(AppError::NotFound(format!("Character {id} not found")));
        }
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        let builder = self
            .http
            .get(self.table_url())
            .query(&[("select", "id"), ("limit", "1")]);
        self.send("health check", builder).await?;
        Ok(())
    }
}
