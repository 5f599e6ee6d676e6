//! Runtime configuration loaded from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_JWT_SECRET: &str = "poster-gen-jwt-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
    pub render_timeout: Duration,
    pub render_settle: Duration,
    pub chrome_executable: Option<PathBuf>,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Configuration("DATABASE_URL must be set".to_string()))?;

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!");
            DEFAULT_JWT_SECRET.to_string()
        });

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 20)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 8080)?,
            jwt_secret,
            access_token_ttl_secs: parse_var("ACCESS_TOKEN_TTL_SECS", 15 * 60)?,
            refresh_token_ttl_secs: parse_var("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?,
            templates_dir: PathBuf::from(
                env::var("TEMPLATES_DIR").unwrap_or_else(|_| "./templates".to_string()),
            ),
            output_dir: PathBuf::from(
                env::var("OUTPUT_DIR").unwrap_or_else(|_| "./posters".to_string()),
            ),
            render_timeout: Duration::from_secs(parse_var("RENDER_TIMEOUT_SECS", 60)?),
            render_settle: Duration::from_millis(parse_var("RENDER_SETTLE_MS", 500)?),
            chrome_executable: env::var("CHROME_EXECUTABLE").ok().map(PathBuf::from),
            cors_origins,
        })
    }

    /// Create the layout and artifact directories if they do not exist yet.
    pub fn ensure_directories(&self) -> Result<(), AppError> {
        for dir in [&self.templates_dir, &self.output_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                log::error!("Failed to create directory {}: {}", dir.display(), e);
                AppError::Configuration(format!("cannot create directory {}", dir.display()))
            })?;
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            AppError::Configuration(format!("invalid value for {}: {}", key, raw))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_uses_default_when_missing() {
        let value: u64 = parse_var("POSTER_GEN_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("POSTER_GEN_TEST_BAD_PORT", "eighty");
        let result: Result<u16, _> = parse_var("POSTER_GEN_TEST_BAD_PORT", 8080);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
