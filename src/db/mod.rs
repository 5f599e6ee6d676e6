//! Database module - AppState and the Postgres repositories
//!
//! One submodule per table family:
//! - `template` / `layout` / `asset` - catalog read by the generation pipeline
//! - `poster` - generated poster records
//! - `user` - accounts and revoked tokens
//! - `order` - orders

mod asset;
mod layout;
mod order;
mod poster;
mod template;
mod user;

pub use asset::PgAssetRepository;
pub use layout::PgLayoutRepository;
pub use order::PgOrderRepository;
pub use poster::PgPosterRepository;
pub use template::PgTemplateRepository;
pub use user::PgUserRepository;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::auth::{JwtService, UserRepository};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::order::OrderRepository;
use crate::poster::model::Template;
use crate::poster::{
    AssetRepository, ChromeRasterizer, LayoutRepository, PosterRepository, PosterService,
    Rasterizer, TemplateRenderer, TemplateRepository,
};
use crate::storage::ArtifactStore;

/// Every storage seam the application talks to.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub layouts: Arc<dyn LayoutRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub posters: Arc<dyn PosterRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            templates: Arc::new(PgTemplateRepository::new(pool.clone())),
            layouts: Arc::new(PgLayoutRepository::new(pool.clone())),
            assets: Arc::new(PgAssetRepository::new(pool.clone())),
            posters: Arc::new(PgPosterRepository::new(pool)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtService,
    pub users: Arc<dyn UserRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub layouts: Arc<dyn LayoutRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub posters: PosterService,
    pub template_cache: Cache<String, Vec<Template>>,
}

impl AppState {
    /// Connect to Postgres, apply migrations and wire the Chromium rasterizer.
    pub async fn new(config: &AppConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            log::error!("Failed to run database migrations: {}", e);
            AppError::Internal("database migration failed".to_string())
        })?;
        log::info!("Database migrations applied");

        let rasterizer = Arc::new(ChromeRasterizer::new(
            config.chrome_executable.clone(),
            config.render_settle,
            config.render_timeout,
        ));

        Ok(Self::from_parts(
            config,
            Repositories::postgres(pool),
            rasterizer,
        ))
    }

    /// Assemble the state from already-built collaborators.
    pub fn from_parts(
        config: &AppConfig,
        repositories: Repositories,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let posters = PosterService::new(
            repositories.templates.clone(),
            repositories.assets.clone(),
            repositories.posters.clone(),
            TemplateRenderer::new(config.templates_dir.clone()),
            rasterizer,
            ArtifactStore::new(config.output_dir.clone()),
            config.render_timeout,
        );

        let template_cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(10)
            .build();

        Self {
            jwt: JwtService::new(
                &config.jwt_secret,
                config.access_token_ttl_secs,
                config.refresh_token_ttl_secs,
            ),
            users: repositories.users,
            orders: repositories.orders,
            templates: repositories.templates,
            layouts: repositories.layouts,
            assets: repositories.assets,
            posters,
            template_cache,
        }
    }
}
