use actix_web::{web, HttpRequest, HttpResponse};

use super::model::{
    generate_order_number, CreateOrderRequest, NewOrder, Order, UpdateOrderRequest, STATUS_PENDING,
};
use crate::auth::{validate_request_token, Claims};
use crate::error::AppError;
use crate::AppState;

fn caller_id(claims: &Claims) -> Result<i64, AppError> {
    claims
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Invalid token subject".to_string()))
}

/// Load an order the caller may see: its owner or an administrator.
async fn load_owned(state: &AppState, claims: &Claims, id: i64) -> Result<Order, AppError> {
    let order = state
        .orders
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    if !claims.is_admin() && Some(order.user_id) != claims.user_id() {
        // Hide other users' orders entirely.
        return Err(AppError::NotFound(format!("order {} not found", id)));
    }
    Ok(order)
}

#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Orders",
    request_body = CreateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Order created", body = Order),
        (status = 400, description = "Invalid amount", body = crate::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn create_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let claims = validate_request_token(&req, &state).await?;
    body.validate()?;
    let user_id = caller_id(&claims)?;

    let order = state
        .orders
        .create(NewOrder {
            user_id,
            order_number: generate_order_number(user_id),
            total_amount: body.total_amount,
            status: STATUS_PENDING.to_string(),
        })
        .await?;

    log::info!("Created order {} for user {}", order.order_number, user_id);
    Ok(HttpResponse::Created().json(order))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = i64, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 404, description = "Order not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let claims = validate_request_token(&req, &state).await?;
    let order = load_owned(&state, &claims, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = i64, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 400, description = "Invalid update", body = crate::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::ErrorResponse)
    )
)]
pub async fn update_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let claims = validate_request_token(&req, &state).await?;
    body.validate()?;
    let id = path.into_inner();
    load_owned(&state, &claims, id).await?;

    let order = state
        .orders
        .update(id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;
    Ok(HttpResponse::Ok().json(order))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = i64, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::ErrorResponse)
    )
)]
pub async fn delete_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let claims = validate_request_token(&req, &state).await?;
    let id = path.into_inner();
    load_owned(&state, &claims, id).await?;

    if !state.orders.delete(id).await? {
        return Err(AppError::NotFound(format!("order {} not found", id)));
    }
    log::info!("Order {} deleted by user {}", id, claims.sub);
    Ok(HttpResponse::NoContent().finish())
}

/// Configure order routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/orders").route(web::post().to(create_order)))
        .service(
            web::resource("/orders/{id}")
                .route(web::get().to(get_order))
                .route(web::patch().to(update_order))
                .route(web::delete().to(delete_order)),
        );
}
