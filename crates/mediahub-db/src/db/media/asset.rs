use super::repository::{asset_not_found, AssetRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediahub_core::models::{Asset, NewAsset};
use mediahub_core::AppError;
use serde_json::{Map, Value as JsonValue};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Row shape of `media_assets`
#[derive(Debug, FromRow)]
pub struct AssetRow {
    pub id: Uuid,
    pub collection_name: String,
    pub disk: String,
    pub conversions_disk: String,
    pub file_name: String,
    pub size: i64,
    pub mime_type: String,
    pub content_hash: String,
    pub data: Json<Map<String, JsonValue>>,
    pub conversions: Json<BTreeMap<String, String>>,
    pub optimized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Asset {
            id: row.id,
            collection_name: row.collection_name,
            disk: row.disk,
            conversions_disk: row.conversions_disk,
            file_name: row.file_name,
            size: row.size,
            mime_type: row.mime_type,
            content_hash: row.content_hash,
            data: row.data.0,
            conversions: row.conversions.0,
            optimized_at: row.optimized_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Keeps updated_at strictly increasing even when two writes land in the same clock tick.
const BUMP_UPDATED_AT: &str = "updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')";

/// PostgreSQL asset repository
///
/// JSON columns are mutated with `jsonb ||` inside a single UPDATE so concurrent
/// derivations of the same asset never overwrite each other's conversion entries.
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    #[tracing::instrument(skip(self, new_asset), fields(db.table = "media_assets", db.operation = "insert"))]
    async fn create(&self, new_asset: NewAsset) -> Result<Asset, AppError> {
        let row: AssetRow = sqlx::query_as::<Postgres, AssetRow>(
            r#"
            INSERT INTO media_assets (
                id, collection_name, disk, conversions_disk, file_name,
                size, mime_type, content_hash, data, conversions, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, '{}'::jsonb, '{}'::jsonb, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_asset.collection_name)
        .bind(&new_asset.disk)
        .bind(&new_asset.conversions_disk)
        .bind(&new_asset.file_name)
        .bind(new_asset.size)
        .bind(&new_asset.mime_type)
        .bind(&new_asset.content_hash)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(asset_id = %row.id, "Asset record created");

        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        let row = sqlx::query_as::<Postgres, AssetRow>("SELECT * FROM media_assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Asset::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select"))]
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Asset>, AppError> {
        let row = sqlx::query_as::<Postgres, AssetRow>(
            r#"
            SELECT * FROM media_assets
            WHERE content_hash = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Asset::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "update", db.record_id = %id))]
    async fn touch(&self, id: Uuid) -> Result<Asset, AppError> {
        let query = format!(
            "UPDATE media_assets SET {} WHERE id = $1 RETURNING *",
            BUMP_UPDATED_AT
        );
        let row = sqlx::query_as::<Postgres, AssetRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::from).ok_or_else(|| asset_not_found(id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "update", db.record_id = %id))]
    async fn mark_optimized(
        &self,
        id: Uuid,
        mime_type: &str,
        size: i64,
    ) -> Result<Asset, AppError> {
        let query = format!(
            r#"
            UPDATE media_assets
            SET mime_type = $2, size = $3, optimized_at = COALESCE(optimized_at, NOW()), {}
            WHERE id = $1
            RETURNING *
            "#,
            BUMP_UPDATED_AT
        );
        let row = sqlx::query_as::<Postgres, AssetRow>(&query)
            .bind(id)
            .bind(mime_type)
            .bind(size)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::from).ok_or_else(|| asset_not_found(id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "update", db.record_id = %id))]
    async fn add_conversion(
        &self,
        id: Uuid,
        conversion_name: &str,
        file_name: &str,
    ) -> Result<Asset, AppError> {
        let query = format!(
            r#"
            UPDATE media_assets
            SET conversions = COALESCE(conversions, '{{}}'::jsonb) || jsonb_build_object($2::text, $3::text), {}
            WHERE id = $1
            RETURNING *
            "#,
            BUMP_UPDATED_AT
        );
        let row = sqlx::query_as::<Postgres, AssetRow>(&query)
            .bind(id)
            .bind(conversion_name)
            .bind(file_name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::from).ok_or_else(|| asset_not_found(id))
    }

    #[tracing::instrument(skip(self, data), fields(db.table = "media_assets", db.operation = "update", db.record_id = %id))]
    async fn update_data(
        &self,
        id: Uuid,
        data: Map<String, JsonValue>,
    ) -> Result<Asset, AppError> {
        let query = format!(
            r#"
            UPDATE media_assets
            SET data = COALESCE(data, '{{}}'::jsonb) || $2::jsonb, {}
            WHERE id = $1
            RETURNING *
            "#,
            BUMP_UPDATED_AT
        );
        let row = sqlx::query_as::<Postgres, AssetRow>(&query)
            .bind(id)
            .bind(Json(data))
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::from).ok_or_else(|| asset_not_found(id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "update", db.record_id = %id))]
    async fn move_to_collection(
        &self,
        id: Uuid,
        collection_name: &str,
    ) -> Result<Asset, AppError> {
        let query = format!(
            "UPDATE media_assets SET collection_name = $2, {} WHERE id = $1 RETURNING *",
            BUMP_UPDATED_AT
        );
        let row = sqlx::query_as::<Postgres, AssetRow>(&query)
            .bind(id)
            .bind(collection_name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Asset::from).ok_or_else(|| asset_not_found(id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select"))]
    async fn list_by_collection(&self, collection_name: &str) -> Result<Vec<Asset>, AppError> {
        let rows = sqlx::query_as::<Postgres, AssetRow>(
            r#"
            SELECT * FROM media_assets
            WHERE collection_name = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(collection_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Asset::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows_affected = sqlx::query("DELETE FROM media_assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
