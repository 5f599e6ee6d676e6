//! Generated poster records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::AppError;
use crate::poster::model::{NewPoster, Poster, PosterStatus};
use crate::poster::PosterRepository;

const POSTER_COLUMNS: &str = "id, template_id, business_name, user_input_data, \
                              final_customization, artifact_url, status, created_at";

#[derive(sqlx::FromRow)]
struct PosterRow {
    id: i64,
    template_id: i64,
    business_name: String,
    user_input_data: Value,
    final_customization: Value,
    artifact_url: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PosterRow> for Poster {
    type Error = AppError;

    fn try_from(row: PosterRow) -> Result<Self, Self::Error> {
        let status = PosterStatus::parse(&row.status).ok_or_else(|| {
            log::error!("Poster {} has unknown status '{}'", row.id, row.status);
            AppError::Internal("stored poster has an unknown status".to_string())
        })?;

        Ok(Poster {
            id: row.id,
            template_id: row.template_id,
            business_name: row.business_name,
            user_input_data: row.user_input_data,
            final_customization: row.final_customization,
            artifact_url: row.artifact_url,
            status,
            created_at: row.created_at,
        })
    }
}

pub struct PgPosterRepository {
    pool: PgPool,
}

impl PgPosterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PosterRepository for PgPosterRepository {
    async fn create(&self, poster: NewPoster) -> Result<Poster, AppError> {
        let sql = format!(
            r#"
            INSERT INTO posters
                (template_id, business_name, user_input_data, final_customization, artifact_url, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            POSTER_COLUMNS
        );
        let row = sqlx::query_as::<_, PosterRow>(&sql)
            .bind(poster.template_id)
            .bind(&poster.business_name)
            .bind(&poster.user_input_data)
            .bind(&poster.final_customization)
            .bind(&poster.artifact_url)
            .bind(poster.status.as_str())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Poster>, AppError> {
        let sql = format!("SELECT {} FROM posters WHERE id = $1", POSTER_COLUMNS);
        let row = sqlx::query_as::<_, PosterRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Poster::try_from).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM posters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
