use actix_web::HttpRequest;

use super::model::{Claims, TOKEN_TYPE_ACCESS};
use crate::error::AppError;
use crate::AppState;

/// Extract token from Authorization header
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Validate the bearer access token of `req` and return its claims
pub async fn validate_request_token(req: &HttpRequest, state: &AppState) -> Result<Claims, AppError> {
    let token = extract_token(req)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    let claims = state.jwt.validate_token(&token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    if claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(AppError::Unauthorized("Invalid token type".to_string()));
    }

    if state.users.is_token_revoked(&claims.jti).await? {
        return Err(AppError::Unauthorized("Token has been revoked".to_string()));
    }

    Ok(claims)
}

/// Like `validate_request_token`, additionally requiring the admin role
pub async fn require_admin(req: &HttpRequest, state: &AppState) -> Result<Claims, AppError> {
    let claims = validate_request_token(req, state).await?;
    if !claims.is_admin() {
        log::warn!("User {} attempted an admin-only operation", claims.sub);
        return Err(AppError::Forbidden("Administrator role required".to_string()));
    }
    Ok(claims)
}
