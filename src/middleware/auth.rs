use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::user;
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "user_token";

/// Validates the session token and, when `roles` is not empty, the caller's
/// role. The resolved user is handed to handlers as a [`CurrentUser`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers()).ok_or(AuthMiddlewareError::MissingToken)?;

    let user = state.app.auth.authenticate(&token).await?;
    state
        .app
        .authorization
        .check_role(Some(&user), state.roles)
        .await?;

    tracing::debug!(user_id = user.id, "Authenticated request");
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct AuthState {
    pub app: AppState,
    pub roles: &'static [&'static str],
}

impl AuthState {
    pub fn new(app: AppState, roles: &'static [&'static str]) -> Self {
        Self { app, roles }
    }
}

/// The authenticated caller of a protected route.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub user::Model);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub username: String,
    pub email: String,
    #[serde(rename = "rolId")]
    pub role_id: i32,
    pub iat: usize,
    pub exp: usize,
}

pub fn generate_token(
    user: &user::Model,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, AuthMiddlewareError> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(ttl_minutes))
        .ok_or(AuthMiddlewareError::GenerationFail)?;

    let claims = Claims {
        user_id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role_id: user.role_id,
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthMiddlewareError::TokenExpired,
        _ => AuthMiddlewareError::ValidationFail,
    })
}

/// Cookie first, `Authorization: Bearer` header second.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value_trimmed().is_empty())
        .map(|cookie| cookie.value_trimmed().to_owned());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
    })
}

pub fn session_cookie(token: &str, ttl_minutes: i64) -> String {
    build_session_cookie(token.to_owned(), CookieDuration::minutes(ttl_minutes))
}

pub fn expired_session_cookie() -> String {
    build_session_cookie(String::new(), CookieDuration::ZERO)
}

fn build_session_cookie(value: String, max_age: CookieDuration) -> String {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
        .to_string()
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Missing session token")]
    MissingToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
}

impl From<AuthMiddlewareError> for ApiError {
    fn from(err: AuthMiddlewareError) -> Self {
        match err {
            AuthMiddlewareError::GenerationFail => ApiError::Internal(err.to_string()),
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}
