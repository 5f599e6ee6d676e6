use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::User;
use crate::error::AppError;

/// Account storage. Lookups and listings only see accounts that are not soft-deleted.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert an account. It gets the admin role when no account exists yet, the user role
    /// otherwise, decided atomically with the insert.
    async fn register(&self, email: &str, password_hash: &str) -> Result<User, AppError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    /// One page ordered by id, plus the total number of active accounts.
    async fn list(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), AppError>;
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError>;
    /// Returns false when no active account has `id`.
    async fn soft_delete(&self, id: i64) -> Result<bool, AppError>;
    /// Returns false when no soft-deleted account has `id`.
    async fn restore(&self, id: i64) -> Result<bool, AppError>;
    /// Block `jti` until `expires_at`.
    async fn revoke_token(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), AppError>;
    async fn is_token_revoked(&self, jti: &str) -> Result<bool, AppError>;
}
