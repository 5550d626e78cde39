use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::User,
    policy::Scope,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the JWTs issued by `POST /api-token-auth/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id, as a decimal string.
    pub sub: String,
    /// The username at issue time. Informational only; the id is authoritative.
    pub username: String,
    /// Expiration Time (exp): tokens are rejected after this instant.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers pass it to the access
/// policy, which is the only code that reads `is_staff`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        AuthUser {
            id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Required identity: resolves the caller or rejects with 401.
///
/// The auth middleware resolves the identity once and stores it in the request extensions;
/// the extractor reuses it before falling back to full resolution.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_identity(parts, state)
            .await?
            .ok_or_else(ApiError::unauthenticated)
    }
}

/// Optional identity: `None` when the request carries no credentials at all. Credentials
/// that are present but invalid are still rejected with 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        resolve_identity(parts, state).await
    }
}

/// resolve_identity
///
/// The process involves:
/// 1. Reuse: an identity already placed in the extensions by the auth middleware.
/// 2. Local Bypass: in `Env::Local`, an `x-user-id` header naming an existing active user.
/// 3. Token Extraction: `Authorization: JWT <token>` or `Authorization: Bearer <token>`.
///    Any other scheme is treated as no credentials.
/// 4. Token Validation and DB Lookup: the user must still exist and be active.
async fn resolve_identity<S>(parts: &mut Parts, state: &S) -> Result<Option<AuthUser>, ApiError>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    if let Some(user) = parts.extensions.get::<AuthUser>() {
        return Ok(Some(user.clone()));
    }

    let repo = RepositoryState::from_ref(state);
    let config = AppConfig::from_ref(state);

    if config.env == Env::Local {
        let bypass_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok());

        if let Some(user_id) = bypass_id {
            if let Some(user) = repo.find_user(user_id, Scope::Unrestricted).await? {
                if user.is_active {
                    tracing::debug!(user_id, "authenticated through local bypass header");
                    return Ok(Some(AuthUser::from(&user)));
                }
            }
        }
    }

    let Some(auth_header) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return Ok(None);
    };

    let mut words = auth_header.split_whitespace();
    let scheme = words.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("jwt") && !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }

    let token = match (words.next(), words.next()) {
        (Some(token), None) => token,
        (None, _) => {
            return Err(ApiError::Unauthenticated(
                "Invalid Authorization header. No credentials provided.".into(),
            ));
        }
        (Some(_), Some(_)) => {
            return Err(ApiError::Unauthenticated(
                "Invalid Authorization header. Credentials string should not contain spaces."
                    .into(),
            ));
        }
    };

    let claims = decode_token(token, &config.jwt_secret)?;
    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthenticated("Invalid payload.".into()))?;

    let user = repo
        .find_user(user_id, Scope::Unrestricted)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Invalid signature.".into()))?;

    if !user.is_active {
        return Err(ApiError::Unauthenticated("User account is disabled.".into()));
    }

    Ok(Some(AuthUser::from(&user)))
}

fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => {
                Err(ApiError::Unauthenticated("Signature has expired.".into()))
            }
            _ => {
                tracing::debug!("rejected token: {:?}", e);
                Err(ApiError::Unauthenticated("Error decoding signature.".into()))
            }
        },
    }
}

/// issue_token
///
/// Signs a token for `user` valid for the configured lifetime.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, ApiError> {
    let now = Utc::now();
    let expires_at = Duration::try_seconds(config.jwt_ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            tracing::error!(ttl = config.jwt_ttl_seconds, "token lifetime out of range");
            ApiError::Internal
        })?;
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("failed to sign token: {:?}", e);
        ApiError::Internal
    })
}

// --- Password Hashing ---

/// Generates a new argon2 PHC hash for `password` with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// Uses argon2 to verify `password` against a stored PHC hash.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    let hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!("failed to parse password hash: {}", err);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

/// hash_password_blocking
///
/// Runs `hash_password` on the blocking pool. Argon2 is deliberately slow and memory-hungry,
/// so request handlers must not run it on a runtime worker.
pub async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!("password hashing task failed: {:?}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

/// Runs `verify_password` on the blocking pool. A failed task counts as a mismatch.
pub async fn verify_password_blocking(password_hash: String, password: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password_hash, &password))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("password verification task failed: {:?}", e);
            false
        })
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("password hashing failed: {}", err);
        ApiError::Internal
    }
}
