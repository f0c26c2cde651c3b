use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{CharacterInsert, CharacterRecord, CharacterRow};
use crate::db::CharacterStore;
use crate::error::{AppError, AppResult};
use crate::llm::media::ImageBlob;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn init(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let in_memory = database_url.contains(":memory:");
        // Each in-memory connection is its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS characters (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                name TEXT NOT NULL,\
                image_data TEXT NOT NULL,\
                created_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_characters_created_at ON characters(created_at);",
        )
        .execute(&pool)
        .await?;

        info!("Database tables created successfully");

        Ok(Database { pool })
    }
}

#[async_trait]
impl CharacterStore for Database {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn create(&self, name: &str, image: &ImageBlob) -> AppResult<CharacterRecord> {
        let insert = CharacterInsert::new(name, image)?;
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO characters (name, image_data, created_at) VALUES (?, ?, ?)",
        )
        .bind(&insert.name)
        .bind(&insert.image_data)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(CharacterRecord {
            id: result.last_insert_rowid().to_string(),
            name: insert.name,
            image_data: insert.image_data,
            created_at,
        })
    }

    async fn list(&self) -> AppResult<Vec<CharacterRecord>> {
        let rows = sqlx::query_as::<_, CharacterRow>(
            "SELECT id, name, image_data, created_at FROM characters \
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CharacterRecord::from).collect())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let not_found = || AppError::NotFound(format!("Character {id} not found"));
        let row_id = id.trim().parse::<i64>().map_err(|_| not_found())?;

        let result = sqlx::query("DELETE FROM characters WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Database {
        Database::init("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamp() {
        let store = memory_store().await;
        let before = Utc::now();
        let record = store
            .create(" Aria ", &ImageBlob::png(vec![1, 2, 3]))
            .await
            .unwrap();
        assert!(!record.id.is_empty());
        assert_eq!(record.name, "Aria");
        assert_eq!(record.image_data, "AQID");
        assert!(record.created_at >= before);
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = memory_store().await;
        for name in ["first", "second", "third"] {
            store.create(name, &ImageBlob::png(vec![7])).await.unwrap();
        }
        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.name)
            .collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn listed_records_round_trip_their_image() {
        let store = memory_store().await;
        let created = store.create("Bram", &ImageBlob::png(vec![4, 5])).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].image().unwrap().bytes, vec![4, 5]);
    }

    #[tokio::test]
    async fn delete_removes_the_record_once() {
        let store = memory_store().await;
        let record = store.create("Cleo", &ImageBlob::png(vec![1])).await.unwrap();

        store.delete(&record.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.delete(&record.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("not-a-number").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_blank_names() {
        let store = memory_store().await;
        let result = store.create("   ", &ImageBlob::png(vec![1])).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        store.health_check().await.unwrap();
    }
}
