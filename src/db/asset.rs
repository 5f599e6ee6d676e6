//! Asset database operations

use async_trait::async_trait;
use sqlx::PgPool;

use crate::catalog::model::CreateAssetRequest;
use crate::error::AppError;
use crate::poster::model::Asset;
use crate::poster::AssetRepository;

const ASSET_COLUMNS: &str = "id, name, type AS asset_type, data, default_color, created_at";

pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    async fn create(&self, request: &CreateAssetRequest) -> Result<Asset, AppError> {
        let sql = format!(
            "INSERT INTO assets (name, type, data, default_color) VALUES ($1, $2, $3, $4) RETURNING {}",
            ASSET_COLUMNS
        );
        let asset = sqlx::query_as::<_, Asset>(&sql)
            .bind(&request.name)
            .bind(&request.asset_type)
            .bind(&request.data)
            .bind(&request.default_color)
            .fetch_one(&self.pool)
            .await?;
        Ok(asset)
    }

    async fn list(&self, asset_type: Option<&str>) -> Result<Vec<Asset>, AppError> {
        let sql = format!(
            "SELECT {} FROM assets WHERE ($1::TEXT IS NULL OR type = $1) ORDER BY created_at DESC",
            ASSET_COLUMNS
        );
        let assets = sqlx::query_as::<_, Asset>(&sql)
            .bind(asset_type)
            .fetch_all(&self.pool)
            .await?;
        Ok(assets)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Asset>, AppError> {
        let sql = format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS);
        let asset = sqlx::query_as::<_, Asset>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(asset)
    }
}
