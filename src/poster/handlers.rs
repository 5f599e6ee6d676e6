use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use super::model::{PosterInput, PosterView};
use crate::auth::require_admin;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct GenerateQuery {
    /// Template to render
    pub template_id: Option<i64>,
}

/// Validate the submitted data, render the template and store the artifact
#[utoipa::path(
    post,
    path = "/api/posters/generate",
    tag = "Posters",
    params(GenerateQuery),
    request_body = PosterInput,
    responses(
        (status = 201, description = "Poster generated", body = PosterView),
        (status = 400, description = "Invalid input, with per-field messages", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse),
        (status = 500, description = "Template, render or rasterization failure", body = crate::ErrorResponse),
        (status = 503, description = "Rendering timed out, retry", body = crate::ErrorResponse)
    )
)]
pub async fn generate_poster(
    state: web::Data<AppState>,
    query: web::Query<GenerateQuery>,
    body: web::Json<PosterInput>,
) -> Result<HttpResponse, AppError> {
    let template_id = query
        .template_id
        .ok_or_else(|| AppError::BadRequest("template_id query parameter is required".into()))?;

    let input = body.into_inner();
    log::info!(
        "Generating poster from template {} for '{}'",
        template_id,
        input.business_name
    );

    let poster = state.posters.generate(template_id, input).await?;
    Ok(HttpResponse::Created().json(PosterView::from(poster)))
}

#[utoipa::path(
    get,
    path = "/api/posters/{id}",
    tag = "Posters",
    params(("id" = i64, Path, description = "Poster ID")),
    responses(
        (status = 200, description = "Poster", body = PosterView),
        (status = 404, description = "Poster not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_poster(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let poster = state.posters.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PosterView::from(poster)))
}

#[utoipa::path(
    delete,
    path = "/api/posters/{id}",
    tag = "Posters",
    params(("id" = i64, Path, description = "Poster ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Poster and artifact deleted"),
        (status = 403, description = "Administrator role required", body = crate::ErrorResponse),
        (status = 404, description = "Poster not found", body = crate::ErrorResponse)
    )
)]
pub async fn delete_poster(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let claims = require_admin(&req, &state).await?;
    let id = path.into_inner();
    state.posters.delete(id).await?;
    log::info!("Poster {} deleted by user {}", id, claims.sub);
    Ok(HttpResponse::NoContent().finish())
}

/// Configure poster routes. Register after the template routes so `/posters/templates` wins.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/posters/generate").route(web::post().to(generate_poster)))
        .service(
            web::resource("/posters/{id:\\d+}")
                .route(web::get().to(get_poster))
                .route(web::delete().to(delete_poster)),
        );
}
