//! Credential resolution boundary
//!
//! Resolves inbound credentials (API key header or externally-issued JWT
//! bearer token) into an actor id plus a closed permission set, once, at
//! the edge. The ledger itself performs no permission logic.

use actix_web::HttpRequest;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use strum::{Display, EnumString};
use tracing::info;
use uuid::Uuid;

use crate::errors::{ApiError, Result};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Closed permission set; resolved once at the boundary and passed into
/// ledger calls as a value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Deposit,
    Transfer,
    Read,
}

impl Permission {
    pub fn all() -> Vec<Permission> {
        vec![Permission::Deposit, Permission::Transfer, Permission::Read]
    }
}

/// Resolved caller identity
#[derive(Debug, Clone)]
pub struct AuthActor {
    pub user_id: Uuid,
    pub permissions: Vec<Permission>,
}

/// JWT claims of an externally-issued token (issuance is out of scope)
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

#[derive(Debug, FromRow)]
struct ApiKeyRow {
    user_id: Uuid,
    permissions: Vec<String>,
    expires_at: DateTime<Utc>,
    is_revoked: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatedApiKey {
    pub api_key: String,
    pub expires_at: DateTime<Utc>,
}

pub struct CredentialResolver {
    pool: PgPool,
    jwt_secret: String,
    max_active_keys: i64,
}

impl CredentialResolver {
    pub fn new(pool: PgPool, jwt_secret: String, max_active_keys: i64) -> Self {
        Self {
            pool,
            jwt_secret,
            max_active_keys,
        }
    }

    /// Create the resolver-owned schema idempotently
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                key TEXT NOT NULL UNIQUE,
                permissions TEXT[] NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                is_revoked BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        Ok(())
    }

    /// Resolve request credentials, requiring `required` to be granted.
    ///
    /// API keys carry their stored permission subset; a valid JWT grants
    /// the full set (it identifies the account owner).
    pub async fn resolve(&self, req: &HttpRequest, required: Permission) -> Result<AuthActor> {
        if let Some(key) = header_value(req, API_KEY_HEADER) {
            let actor = self.resolve_api_key(&key).await?;
            if !actor.permissions.contains(&required) {
                return Err(ApiError::Forbidden(format!(
                    "Missing required permission: {required}"
                )));
            }
            return Ok(actor);
        }

        self.resolve_bearer(req)
    }

    /// Resolve a JWT bearer token only; used where API keys are not
    /// acceptable (for example, minting new API keys).
    pub fn resolve_bearer(&self, req: &HttpRequest) -> Result<AuthActor> {
        let header = header_value(req, "authorization")
            .ok_or_else(|| ApiError::Unauthorized("Missing credentials".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".to_string()))?;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?
        .claims;

        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;

        Ok(AuthActor {
            user_id,
            permissions: Permission::all(),
        })
    }

    async fn resolve_api_key(&self, key: &str) -> Result<AuthActor> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT user_id, permissions, expires_at, is_revoked \
             FROM api_keys WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))?;

        if row.is_revoked {
            return Err(ApiError::Unauthorized("API key has been revoked".to_string()));
        }

        if row.expires_at < Utc::now() {
            return Err(ApiError::Unauthorized("API key has expired".to_string()));
        }

        let permissions = row
            .permissions
            .iter()
            .filter_map(|p| p.parse::<Permission>().ok())
            .collect();

        Ok(AuthActor {
            user_id: row.user_id,
            permissions,
        })
    }

    /// Mint a new API key for `user_id`, bounded by the live-key quota.
    pub async fn create_api_key(
        &self,
        user_id: Uuid,
        name: &str,
        permissions: &[Permission],
        expiry: &str,
    ) -> Result<CreatedApiKey> {
        if permissions.is_empty() {
            return Err(ApiError::Validation(
                "At least one permission is required".to_string(),
            ));
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM api_keys \
             WHERE user_id = $1 AND is_revoked = FALSE AND expires_at > $2",
        )
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        if active >= self.max_active_keys {
            return Err(ApiError::Validation(format!(
                "Maximum {} active API keys allowed per user",
                self.max_active_keys
            )));
        }

        let expires_at = calculate_expiry(expiry)?;
        let key = generate_api_key();
        let permission_codes: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();

        sqlx::query(
            "INSERT INTO api_keys \
             (id, user_id, name, key, permissions, expires_at, is_revoked, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(&key)
        .bind(&permission_codes)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        info!(%user_id, %expires_at, "api key created");
        Ok(CreatedApiKey {
            api_key: key,
            expires_at,
        })
    }
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Opaque secret: random material hashed so key entropy never depends on
/// uuid structure.
fn generate_api_key() -> String {
    let mut random = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random);

    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(b":");
    hasher.update(random);
    format!("sk_live_{}", hex::encode(hasher.finalize()))
}

fn calculate_expiry(expiry: &str) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    let duration = match expiry {
        "1H" => Duration::hours(1),
        "1D" => Duration::days(1),
        "1M" => Duration::days(30),
        "1Y" => Duration::days(365),
        _ => {
            return Err(ApiError::Validation(
                "Invalid expiry format. Use: 1H, 1D, 1M, or 1Y".to_string(),
            ))
        }
    };
    Ok(now + duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_parse_is_case_insensitive() {
        assert_eq!("DEPOSIT".parse::<Permission>().unwrap(), Permission::Deposit);
        assert_eq!("transfer".parse::<Permission>().unwrap(), Permission::Transfer);
        assert!("withdraw".parse::<Permission>().is_err());
    }

    #[test]
    fn api_key_shape() {
        let key = generate_api_key();
        assert!(key.starts_with("sk_live_"));
        assert_eq!(key.len(), "sk_live_".len() + 64);
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn expiry_classes() {
        assert!(calculate_expiry("1H").is_ok());
        assert!(calculate_expiry("1Y").is_ok());
        assert!(calculate_expiry("2W").is_err());
    }
}
