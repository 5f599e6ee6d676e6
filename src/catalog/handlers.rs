use actix_web::{web, HttpRequest, HttpResponse};

use super::model::{
    AssetQuery, CreateAssetRequest, CreateLayoutRequest, CreateTemplateRequest,
    UpdateTemplateRequest,
};
use crate::auth::require_admin;
use crate::error::AppError;
use crate::poster::model::{Asset, Layout, Template, LOGO_ASSET_TYPE};
use crate::AppState;

pub const ACTIVE_TEMPLATES_CACHE_KEY: &str = "active_templates";

async fn ensure_layout_exists(state: &AppState, layout_id: i64) -> Result<(), AppError> {
    if state.layouts.get_by_id(layout_id).await?.is_none() {
        return Err(AppError::invalid_field(
            "layout_id",
            format!("Layout {} does not exist.", layout_id),
        ));
    }
    Ok(())
}

async fn invalidate_template_cache(state: &AppState) {
    state
        .template_cache
        .invalidate(ACTIVE_TEMPLATES_CACHE_KEY)
        .await;
    log::debug!("Active template cache invalidated");
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/posters/templates",
    tag = "Templates",
    responses(
        (status = 200, description = "Active templates", body = Vec<Template>)
    )
)]
pub async fn list_active_templates(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    if let Some(templates) = state.template_cache.get(ACTIVE_TEMPLATES_CACHE_KEY).await {
        log::debug!("Serving {} active templates from cache", templates.len());
        return Ok(HttpResponse::Ok().json(templates));
    }

    let templates = state.templates.list_active().await?;
    state
        .template_cache
        .insert(ACTIVE_TEMPLATES_CACHE_KEY.to_string(), templates.clone())
        .await;
    Ok(HttpResponse::Ok().json(templates))
}

#[utoipa::path(
    post,
    path = "/api/posters/templates",
    tag = "Templates",
    request_body = CreateTemplateRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Template created", body = Template),
        (status = 400, description = "Invalid template definition", body = crate::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::ErrorResponse)
    )
)]
pub async fn create_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateTemplateRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &state).await?;
    let mut request = body.into_inner();
    request.validate()?;
    ensure_layout_exists(&state, request.layout_id).await?;

    let template = state.templates.create(&request).await?;
    invalidate_template_cache(&state).await;
    log::info!("Created template {} ({})", template.id, template.name);
    Ok(HttpResponse::Created().json(template))
}

#[utoipa::path(
    get,
    path = "/api/posters/templates/{id}",
    tag = "Templates",
    params(("id" = i64, Path, description = "Template ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Template", body = Template),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &state).await?;
    let id = path.into_inner();
    let template = state
        .templates
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("template {} not found", id)))?;
    Ok(HttpResponse::Ok().json(template))
}

#[utoipa::path(
    patch,
    path = "/api/posters/templates/{id}",
    tag = "Templates",
    params(("id" = i64, Path, description = "Template ID")),
    request_body = UpdateTemplateRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Template updated", body = Template),
        (status = 400, description = "Invalid template definition", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    )
)]
pub async fn update_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateTemplateRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &state).await?;
    let id = path.into_inner();
    let mut request = body.into_inner();
    request.validate()?;
    if let Some(layout_id) = request.layout_id {
        ensure_layout_exists(&state, layout_id).await?;
    }

    let template = state
        .templates
        .update(id, &request)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("template {} not found", id)))?;
    invalidate_template_cache(&state).await;
    Ok(HttpResponse::Ok().json(template))
}

#[utoipa::path(
    delete,
    path = "/api/posters/templates/{id}",
    tag = "Templates",
    params(("id" = i64, Path, description = "Template ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found", body = crate::ErrorResponse),
        (status = 409, description = "Template still has posters", body = crate::ErrorResponse)
    )
)]
pub async fn delete_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &state).await?;
    let id = path.into_inner();
    if !state.templates.delete(id).await? {
        return Err(AppError::NotFound(format!("template {} not found", id)));
    }
    invalidate_template_cache(&state).await;
    log::info!("Deleted template {}", id);
    Ok(HttpResponse::NoContent().finish())
}

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/layouts",
    tag = "Layouts",
    request_body = CreateLayoutRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Layout registered", body = Layout),
        (status = 400, description = "Invalid layout path", body = crate::ErrorResponse)
    )
)]
pub async fn create_layout(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateLayoutRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &state).await?;
    body.validate()?;
    let layout = state
        .layouts
        .create(body.name.trim(), body.file_path.trim())
        .await?;
    Ok(HttpResponse::Created().json(layout))
}

#[utoipa::path(
    get,
    path = "/api/layouts",
    tag = "Layouts",
    responses(
        (status = 200, description = "All layouts", body = Vec<Layout>)
    )
)]
pub async fn list_layouts(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.layouts.list().await?))
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/assets",
    tag = "Assets",
    request_body = CreateAssetRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 400, description = "Invalid asset", body = crate::ErrorResponse)
    )
)]
pub async fn create_asset(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateAssetRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &state).await?;
    body.validate()?;
    let asset = state.assets.create(&body).await?;
    log::info!("Created {} asset {}", asset.asset_type, asset.id);
    Ok(HttpResponse::Created().json(asset))
}

#[utoipa::path(
    get,
    path = "/api/assets",
    tag = "Assets",
    params(AssetQuery),
    responses(
        (status = 200, description = "Assets, optionally filtered by type", body = Vec<Asset>)
    )
)]
pub async fn list_assets(
    state: web::Data<AppState>,
    query: web::Query<AssetQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = query.asset_type.as_deref().filter(|t| !t.is_empty());
    Ok(HttpResponse::Ok().json(state.assets.list(filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/assets/{id}",
    tag = "Assets",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_asset(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let asset = state
        .assets
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("asset {} not found", id)))?;
    Ok(HttpResponse::Ok().json(asset))
}

#[utoipa::path(
    get,
    path = "/api/logos",
    tag = "Assets",
    responses(
        (status = 200, description = "Assets of type logo", body = Vec<Asset>)
    )
)]
pub async fn list_logos(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.assets.list(Some(LOGO_ASSET_TYPE)).await?))
}

/// Configure template, layout and asset routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/posters/templates")
            .route(web::get().to(list_active_templates))
            .route(web::post().to(create_template)),
    )
    .service(
        web::resource("/posters/templates/{id}")
            .route(web::get().to(get_template))
            .route(web::patch().to(update_template))
            .route(web::delete().to(delete_template)),
    )
    .service(
        web::resource("/layouts")
            .route(web::get().to(list_layouts))
            .route(web::post().to(create_layout)),
    )
    .service(
        web::resource("/assets")
            .route(web::get().to(list_assets))
            .route(web::post().to(create_asset)),
    )
    .service(web::resource("/assets/{id}").route(web::get().to(get_asset)))
    .service(web::resource("/logos").route(web::get().to(list_logos)));
}
