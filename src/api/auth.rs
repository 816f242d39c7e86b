use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::json_body;
use crate::error::ApiResult;
use crate::middleware::auth::{expired_session_cookie, session_cookie};
use crate::services::users::UserSummary;
use crate::state::AppState;

pub fn auth_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .layer(Extension(state))
}

async fn login(
    Extension(state): Extension<AppState>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = json_body(payload)?;
    let outcome = state.auth.login(&payload.email, &payload.password).await?;
    let cookie = session_cookie(&outcome.token, state.auth.token_ttl_minutes());

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            access_token: outcome.token,
            user: outcome.user.into(),
        }),
    )
        .into_response())
}

async fn logout(
    Extension(state): Extension<AppState>,
    payload: Result<Json<LogoutPayload>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = json_body(payload)?;
    state.auth.logout(&payload.email).await?;

    Ok(([(header::SET_COOKIE, expired_session_cookie())], "Session closed").into_response())
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LogoutPayload {
    email: String,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    user: UserSummary,
}
