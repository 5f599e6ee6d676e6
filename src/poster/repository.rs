//! Storage seams used by the generation pipeline and the catalog endpoints.
//!
//! SQL implementations live in `crate::db`; tests substitute in-memory ones.

use async_trait::async_trait;

use super::model::{Asset, Layout, NewPoster, Poster, Template};
use crate::catalog::model::{CreateAssetRequest, CreateTemplateRequest, UpdateTemplateRequest};
use crate::error::AppError;

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Template with its layout file path joined in.
    async fn get_by_id(&self, id: i64) -> Result<Option<Template>, AppError>;
    async fn list_active(&self) -> Result<Vec<Template>, AppError>;
    async fn create(&self, request: &CreateTemplateRequest) -> Result<Template, AppError>;
    async fn update(
        &self,
        id: i64,
        request: &UpdateTemplateRequest,
    ) -> Result<Option<Template>, AppError>;
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

#[async_trait]
pub trait LayoutRepository: Send + Sync {
    async fn create(&self, name: &str, file_path: &str) -> Result<Layout, AppError>;
    async fn list(&self) -> Result<Vec<Layout>, AppError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Layout>, AppError>;
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn create(&self, request: &CreateAssetRequest) -> Result<Asset, AppError>;
    /// All assets, optionally restricted to one type.
    async fn list(&self, asset_type: Option<&str>) -> Result<Vec<Asset>, AppError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Asset>, AppError>;
}

#[async_trait]
pub trait PosterRepository: Send + Sync {
    async fn create(&self, poster: NewPoster) -> Result<Poster, AppError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Poster>, AppError>;
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}
