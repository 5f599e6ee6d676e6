//! Poster template database operations

use async_trait::async_trait;
use sqlx::PgPool;

use crate::catalog::model::{CreateTemplateRequest, UpdateTemplateRequest};
use crate::error::AppError;
use crate::poster::model::Template;
use crate::poster::TemplateRepository;

/// Columns of a template joined with its layout, selected from `t` and `l`.
const TEMPLATE_COLUMNS: &str = r#"
    t.id, t.name, t.type AS template_type, t.layout_id,
    COALESCE(l.file_path, '') AS layout_file_path,
    t.price, t.thumbnail_url, t.is_active, t.required_fields, t.default_customization,
    t.created_at, t.updated_at
"#;

pub struct PgTemplateRepository {
    pool: PgPool,
}

impl PgTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepository for PgTemplateRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Template>, AppError> {
        let sql = format!(
            "SELECT {} FROM poster_templates t LEFT JOIN layouts l ON l.id = t.layout_id WHERE t.id = $1",
            TEMPLATE_COLUMNS
        );
        let template = sqlx::query_as::<_, Template>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(template)
    }

    async fn list_active(&self) -> Result<Vec<Template>, AppError> {
        let sql = format!(
            "SELECT {} FROM poster_templates t LEFT JOIN layouts l ON l.id = t.layout_id \
             WHERE t.is_active ORDER BY t.created_at DESC",
            TEMPLATE_COLUMNS
        );
        let templates = sqlx::query_as::<_, Template>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(templates)
    }

    async fn create(&self, request: &CreateTemplateRequest) -> Result<Template, AppError> {
        let sql = format!(
            r#"
            WITH t AS (
                INSERT INTO poster_templates
                    (name, type, layout_id, price, thumbnail_url, is_active, required_fields, default_customization)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
            )
            SELECT {} FROM t LEFT JOIN layouts l ON l.id = t.layout_id
            "#,
            TEMPLATE_COLUMNS
        );
        let template = sqlx::query_as::<_, Template>(&sql)
            .bind(&request.name)
            .bind(&request.template_type)
            .bind(request.layout_id)
            .bind(request.price)
            .bind(&request.thumbnail_url)
            .bind(request.is_active)
            .bind(&request.required_fields)
            .bind(&request.default_customization)
            .fetch_one(&self.pool)
            .await?;
        Ok(template)
    }

    async fn update(
        &self,
        id: i64,
        request: &UpdateTemplateRequest,
    ) -> Result<Option<Template>, AppError> {
        let sql = format!(
            r#"
            WITH t AS (
                UPDATE poster_templates SET
                    name = COALESCE($2, name),
                    type = COALESCE($3, type),
                    layout_id = COALESCE($4, layout_id),
                    price = COALESCE($5, price),
                    thumbnail_url = COALESCE($6, thumbnail_url),
                    is_active = COALESCE($7, is_active),
                    required_fields = COALESCE($8, required_fields),
                    default_customization = COALESCE($9, default_customization),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM t LEFT JOIN layouts l ON l.id = t.layout_id
            "#,
            TEMPLATE_COLUMNS
        );
        let template = sqlx::query_as::<_, Template>(&sql)
            .bind(id)
            .bind(&request.name)
            .bind(&request.template_type)
            .bind(request.layout_id)
            .bind(request.price)
            .bind(&request.thumbnail_url)
            .bind(request.is_active)
            .bind(&request.required_fields)
            .bind(&request.default_customization)
            .fetch_optional(&self.pool)
            .await?;
        Ok(template)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM poster_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
