//! Rider bearer-token and admin basic authentication

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::config::AuthConfig;
use crate::domain::types::{User, UserId};
use crate::server::AppState;

/// `sub` may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    Number(i64),
    Text(String),
}

impl Subject {
    fn user_id(&self) -> Option<UserId> {
        let id = match self {
            Subject::Number(n) => *n,
            Subject::Text(s) => s.parse().ok()?,
        };
        (id > 0).then(|| UserId::new(id))
    }
}

/// Only `sub` and `exp` are required; the profile claims are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Subject,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl Claims {
    pub fn new(sub: Subject, exp: u64) -> Self {
        Self {
            sub,
            exp,
            email: None,
            first_name: None,
            last_name: None,
        }
    }

    fn for_user(user: &User, exp: u64) -> Self {
        Self {
            sub: Subject::Number(user.id.as_i64()),
            exp,
            email: Some(user.email.clone()),
            first_name: Some(user.first_name.clone()),
            last_name: Some(user.last_name.clone()),
        }
    }
}

/// Verified rider identity, stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Bearer token handed out at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signing and verification with the shared secret
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken, ApiError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| ApiError::internal(format!("token lifetime out of range: {e}")))?;
        let expires_at = Utc::now() + ttl;
        let exp = u64::try_from(expires_at.timestamp())
            .map_err(|e| ApiError::internal(format!("token expiry out of range: {e}")))?;

        let token = encode(
            &Header::new(Algorithm::HS256),
            &Claims::for_user(user, exp),
            &self.encoding,
        )
        .map_err(|e| ApiError::internal(format!("failed to sign token: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::bearer_unauthorized("Invalid or expired token")
        })?;

        data.claims
            .sub
            .user_id()
            .ok_or_else(|| ApiError::bearer_unauthorized("Token subject is not a valid user id"))
    }
}

fn authorization_header(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}

/// Require `Authorization: Bearer <jwt>` and attach the rider's id.
pub async fn rider_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match authorization_header(&req).and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.trim(),
        None => {
            return ApiError::bearer_unauthorized("Missing bearer token").into_response();
        }
    };

    match state.jwt.verify(token) {
        Ok(user_id) => {
            req.extensions_mut().insert(AuthenticatedUser(user_id));
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Compare supplied basic credentials against the configured admin account.
pub fn admin_credentials_match(header: &str, config: &AuthConfig) -> bool {
    let Some(encoded) = header.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((username, password)) = decoded.split_once(':') else {
        return false;
    };

    let user_ok = username.as_bytes().ct_eq(config.admin_username.as_bytes());
    let pass_ok = password.as_bytes().ct_eq(config.admin_password.as_bytes());
    (user_ok & pass_ok).into()
}

/// Require admin basic credentials.
pub async fn admin_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let authorized = authorization_header(&req)
        .map(|h| admin_credentials_match(h, &state.config.auth))
        .unwrap_or(false);

    if !authorized {
        warn!(path = %req.uri().path(), "Rejected admin request");
        return ApiError::admin_unauthorized("Admin credentials required").into_response();
    }
    next.run(req).await
}
