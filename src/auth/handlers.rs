use actix_web::{web, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{TimeZone, Utc};

use super::middleware::{require_admin, validate_request_token};
use super::model::{
    ChangePasswordRequest, Claims, LoginRequest, PageMetadata, PageQuery, RefreshRequest,
    RegisterRequest, TokenResponse, User, UserPage, UserView, TOKEN_TYPE_REFRESH,
};
use crate::error::AppError;
use crate::poster::validation::{validate_required, ValidationError, ValidationErrors};
use crate::AppState;

const MIN_PASSWORD_CHARS: usize = 8;

fn issue_tokens(state: &AppState, user: &User) -> Result<TokenResponse, AppError> {
    let access_token = state.jwt.generate_access_token(user).map_err(|e| {
        log::error!("Failed to generate access token: {:?}", e);
        AppError::Internal("Failed to generate token".to_string())
    })?;
    let refresh_token = state.jwt.generate_refresh_token(user).map_err(|e| {
        log::error!("Failed to generate refresh token: {:?}", e);
        AppError::Internal("Failed to generate token".to_string())
    })?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry(),
    })
}

fn validate_password_length(password: &str, field: &str, errors: &mut ValidationErrors) {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.add(ValidationError::new(
            field,
            format!("Password must be at least {} characters.", MIN_PASSWORD_CHARS),
        ));
    }
}

fn validate_registration(body: &RegisterRequest) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();
    validate_required(&body.email, "email", "Email", &mut errors);
    if !body.email.trim().is_empty() && !body.email.contains('@') {
        errors.add(ValidationError::new("email", "Email must be a valid address."));
    }
    validate_password_length(&body.password, "password", &mut errors);
    errors.into_result()
}

fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST).map_err(|e| {
        log::error!("Failed to hash password: {:?}", e);
        AppError::Internal("Failed to hash password".to_string())
    })
}

/// Account owners may act on themselves; admins on anyone.
fn ensure_self_or_admin(claims: &Claims, user_id: i64) -> Result<(), AppError> {
    if claims.is_admin() || claims.user_id() == Some(user_id) {
        Ok(())
    } else {
        log::warn!("User {} attempted to access account {}", claims.sub, user_id);
        Err(AppError::Forbidden(
            "Not allowed to access this account".to_string(),
        ))
    }
}

fn user_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

/// Register a new account. The very first account becomes the administrator.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserView),
        (status = 400, description = "Invalid email or password", body = crate::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::ErrorResponse)
    )
)]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    validate_registration(&body)?;
    let email = body.email.trim().to_lowercase();

    if state.users.get_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(&body.password)?;

    let user = state.users.register(&email, &password_hash).await?;
    log::info!("Registered user {} ({})", user.id, user.role);
    Ok(HttpResponse::Created().json(UserView::from(user)))
}

/// Login endpoint
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::ErrorResponse)
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = body.email.trim().to_lowercase();
    let user = state.users.get_by_email(&email).await?.ok_or_else(invalid)?;

    let password_valid = verify(&body.password, &user.password_hash).unwrap_or(false);
    if !password_valid {
        log::warn!("Failed login attempt for user {}", user.id);
        return Err(invalid());
    }

    Ok(HttpResponse::Ok().json(issue_tokens(&state, &user)?))
}

/// Refresh access token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid refresh token", body = crate::ErrorResponse)
    )
)]
pub async fn refresh_token(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    let claims = state.jwt.validate_token(&body.refresh_token).map_err(|e| {
        log::warn!("Invalid refresh token: {:?}", e);
        AppError::Unauthorized("Invalid or expired refresh token".to_string())
    })?;

    if claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(AppError::Unauthorized("Invalid token type".to_string()));
    }
    if state.users.is_token_revoked(&claims.jti).await? {
        return Err(AppError::Unauthorized("Session expired. Please login again.".to_string()));
    }

    let user = match claims.user_id() {
        Some(id) => state.users.get_by_id(id).await?,
        None => None,
    }
    .ok_or_else(|| AppError::Unauthorized("Session expired. Please login again.".to_string()))?;

    // Only the access token is replaced; the refresh token stays valid until it expires.
    let mut tokens = issue_tokens(&state, &user)?;
    tokens.refresh_token = body.refresh_token.clone();
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke the presented access token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let claims = validate_request_token(&req, &state).await?;
    let expires_at = Utc
        .timestamp_opt(claims.exp as i64, 0)
        .single()
        .unwrap_or_else(Utc::now);

    state.users.revoke_token(&claims.jti, expires_at).await?;
    log::info!("User {} logged out", claims.sub);
    Ok(HttpResponse::NoContent().finish())
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authenticated user", body = UserView),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let claims = validate_request_token(&req, &state).await?;
    let user = match claims.user_id() {
        Some(id) => state.users.get_by_id(id).await?,
        None => None,
    }
    .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

/// List active accounts, one page at a time
#[utoipa::path(
    get,
    path = "/api/auth/users",
    tag = "Authentication",
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of users", body = UserPage),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::ErrorResponse)
    )
)]
pub async fn list_users(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    require_admin(&req, &state).await?;

    let (page, limit) = (query.page(), query.limit());
    let (users, total) = state.users.list(query.offset(), limit).await?;

    Ok(HttpResponse::Ok().json(UserPage {
        data: users.into_iter().map(UserView::from).collect(),
        metadata: PageMetadata::new(page, limit, total),
    }))
}

/// Profile of one account
#[utoipa::path(
    get,
    path = "/api/auth/profile/{id}",
    tag = "Authentication",
    params(("id" = i64, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User profile", body = UserView),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 403, description = "Not the account owner", body = crate::ErrorResponse),
        (status = 404, description = "User not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let claims = validate_request_token(&req, &state).await?;
    ensure_self_or_admin(&claims, id)?;

    let user = state.users.get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

/// Replace the password after checking the current one
#[utoipa::path(
    put,
    path = "/api/auth/users/{id}/change-password",
    tag = "Authentication",
    params(("id" = i64, Path, description = "User id")),
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password too short", body = crate::ErrorResponse),
        (status = 401, description = "Unauthorized or wrong old password", body = crate::ErrorResponse),
        (status = 403, description = "Not the account owner", body = crate::ErrorResponse),
        (status = 404, description = "User not found", body = crate::ErrorResponse)
    )
)]
pub async fn change_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let claims = validate_request_token(&req, &state).await?;
    ensure_self_or_admin(&claims, id)?;

    let mut errors = ValidationErrors::new();
    validate_required(&body.old_password, "old_password", "Old password", &mut errors);
    validate_password_length(&body.new_password, "new_password", &mut errors);
    errors.into_result()?;

    let user = state.users.get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;
    if !verify(&body.old_password, &user.password_hash).unwrap_or(false) {
        log::warn!("Old password mismatch for user {}", id);
        return Err(AppError::Unauthorized("Invalid old password".to_string()));
    }

    let password_hash = hash_password(&body.new_password)?;
    if !state.users.update_password(id, &password_hash).await? {
        return Err(user_not_found(id));
    }

    log::info!("Password changed for user {}", id);
    Ok(HttpResponse::NoContent().finish())
}

/// Soft-delete an account
#[utoipa::path(
    delete,
    path = "/api/auth/users/{id}",
    tag = "Authentication",
    params(("id" = i64, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 403, description = "Not the account owner", body = crate::ErrorResponse),
        (status = 404, description = "User not found", body = crate::ErrorResponse)
    )
)]
pub async fn delete_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let claims = validate_request_token(&req, &state).await?;
    ensure_self_or_admin(&claims, id)?;

    if !state.users.soft_delete(id).await? {
        return Err(user_not_found(id));
    }

    log::info!("User {} soft-deleted by {}", id, claims.sub);
    Ok(HttpResponse::NoContent().finish())
}

/// Restore a soft-deleted account
#[utoipa::path(
    put,
    path = "/api/auth/users/{id}/restore",
    tag = "Authentication",
    params(("id" = i64, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "User restored"),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::ErrorResponse),
        (status = 404, description = "No deleted user with this id", body = crate::ErrorResponse)
    )
)]
pub async fn restore_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let claims = require_admin(&req, &state).await?;

    if !state.users.restore(id).await? {
        return Err(user_not_found(id));
    }

    log::info!("User {} restored by {}", id, claims.sub);
    Ok(HttpResponse::NoContent().finish())
}

/// Configure auth routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh_token))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me))
            .route("/users", web::get().to(list_users))
            .route("/profile/{id}", web::get().to(get_profile))
            .route("/users/{id}", web::delete().to(delete_user))
            .route("/users/{id}/change-password", web::put().to(change_password))
            .route("/users/{id}/restore", web::put().to(restore_user)),
    );
}
