use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::poster::model::Layout;
use crate::poster::LayoutRepository;

pub struct PgLayoutRepository {
    pool: PgPool,
}

impl PgLayoutRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LayoutRepository for PgLayoutRepository {
    async fn create(&self, name: &str, file_path: &str) -> Result<Layout, AppError> {
        let layout = sqlx::query_as::<_, Layout>(
            "INSERT INTO layouts (name, file_path) VALUES ($1, $2) RETURNING id, name, file_path, created_at",
        )
        .bind(name)
        .bind(file_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(layout)
    }

    async fn list(&self) -> Result<Vec<Layout>, AppError> {
        let layouts = sqlx::query_as::<_, Layout>(
            "SELECT id, name, file_path, created_at FROM layouts ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(layouts)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Layout>, AppError> {
        let layout = sqlx::query_as::<_, Layout>(
            "SELECT id, name, file_path, created_at FROM layouts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(layout)
    }
}
