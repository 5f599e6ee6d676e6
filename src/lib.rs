use std::collections::BTreeMap;
use std::path::Path;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod order;
pub mod poster;
pub mod storage;

pub use crate::config::AppConfig;
pub use crate::db::{AppState, Repositories};
pub use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
    /// Per-field messages for validation failures, keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
    /// Set when retrying the same request may succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            fields: None,
            retryable: None,
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::handlers::list_users,
        crate::auth::handlers::get_profile,
        crate::auth::handlers::change_password,
        crate::auth::handlers::delete_user,
        crate::auth::handlers::restore_user,
        crate::poster::handlers::generate_poster,
        crate::poster::handlers::get_poster,
        crate::poster::handlers::delete_poster,
        crate::catalog::handlers::list_active_templates,
        crate::catalog::handlers::create_template,
        crate::catalog::handlers::get_template,
        crate::catalog::handlers::update_template,
        crate::catalog::handlers::delete_template,
        crate::catalog::handlers::create_layout,
        crate::catalog::handlers::list_layouts,
        crate::catalog::handlers::create_asset,
        crate::catalog::handlers::list_assets,
        crate::catalog::handlers::get_asset,
        crate::catalog::handlers::list_logos,
        crate::order::handlers::create_order,
        crate::order::handlers::get_order,
        crate::order::handlers::update_order,
        crate::order::handlers::delete_order
    ),
    components(
        schemas(
            ErrorResponse,
            auth::model::RegisterRequest,
            auth::model::LoginRequest,
            auth::model::RefreshRequest,
            auth::model::TokenResponse,
            auth::model::UserView,
            auth::model::ChangePasswordRequest,
            auth::model::PageMetadata,
            auth::model::UserPage,
            poster::model::PosterInput,
            poster::model::PosterView,
            poster::model::PosterStatus,
            poster::model::OutputFormat,
            poster::model::Template,
            poster::model::FieldSpec,
            poster::model::Layout,
            poster::model::Asset,
            catalog::model::CreateTemplateRequest,
            catalog::model::UpdateTemplateRequest,
            catalog::model::CreateLayoutRequest,
            catalog::model::CreateAssetRequest,
            order::model::Order,
            order::model::CreateOrderRequest,
            order::model::UpdateOrderRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Posters", description = "Poster generation endpoints."),
        (name = "Templates", description = "Poster template administration."),
        (name = "Layouts", description = "HTML layout registry."),
        (name = "Assets", description = "Logos and other design assets."),
        (name = "Orders", description = "Order endpoints."),
        (name = "Authentication", description = "Registration, login, token and account endpoints.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost")
    )
)]
pub struct ApiDoc;

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected request body: {}", err);
        AppError::BadRequest(format!("invalid request body: {}", err)).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("invalid query string: {}", err)).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("invalid path parameter: {}", err)).into()
    })
}

/// API routes and extractor error handling. Mounted by `run()` and by the HTTP tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .route("/health", web::get().to(health))
        .service(
            web::scope("/api")
                .configure(auth::config)
                .configure(catalog::config) // before poster routes, see `poster::config`
                .configure(poster::config)
                .configure(order::config),
        );
}

/// Read-only artifact files. Directory paths get 404, never a listing.
pub fn artifact_files(output_dir: &Path) -> Files {
    Files::new(storage::ARTIFACT_URL_PREFIX, output_dir).use_etag(true)
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    config.ensure_directories()?;

    if !poster::rasterizer::chrome_available(config.chrome_executable.as_deref()) {
        log::warn!("No Chromium executable found; poster generation will fail until one is installed or CHROME_EXECUTABLE is set");
    }

    let app_state = match AppState::new(&config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to connect to database. Please check DATABASE_URL in .env and ensure the database is running. Error: {}", e);
            return Err(e.into());
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("poster_gen_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    let output_dir = config.output_dir.clone();
    let cors_origins = config.cors_origins.clone();
    let bind_address = (config.server_host.clone(), config.server_port);

    log::info!(
        "Starting server at http://{}:{}",
        bind_address.0,
        bind_address.1
    );

    HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }
        let cors = cors
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(routes)
            .service(artifact_files(&output_dir))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind_address)?
    .run()
    .await?;

    Ok(())
}
