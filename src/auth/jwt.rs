use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::model::{Claims, User, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};

/// Issues and validates HS256 tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Generate access token (short-lived)
    pub fn generate_access_token(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        self.generate(user, TOKEN_TYPE_ACCESS, self.access_ttl_secs)
    }

    /// Generate refresh token (long-lived)
    pub fn generate_refresh_token(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        self.generate(user, TOKEN_TYPE_REFRESH, self.refresh_ttl_secs)
    }

    fn generate(
        &self,
        user: &User,
        token_type: &str,
        ttl_secs: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            exp: now + ttl_secs.max(0) as usize,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Validate signature and expiry, then decode
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(token_data.claims)
    }

    pub fn access_token_expiry(&self) -> i64 {
        self.access_ttl_secs
    }
}
