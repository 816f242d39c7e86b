pub mod auth;
pub mod cart;
pub mod order;
pub mod product;
pub mod uploads;
pub mod users;

use axum::{extract::rejection::JsonRejection, middleware::from_fn, Json, Router};
use tower_http::trace::TraceLayer;

use crate::entities::role;
use crate::error::{ApiError, ApiResult};
use crate::middleware::logging::logging_middleware;
use crate::state::AppState;

use auth::auth_router;
use cart::cart_router;
use order::order_router;
use product::product_router;
use uploads::uploads_router;
use users::users_router;

/// Any logged-in user.
pub const AUTHENTICATED: &[&str] = &[];
pub const MERCHANT_ONLY: &[&str] = &[role::MERCHANT];

pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_router(state.clone()))
        .merge(users_router(state.clone()))
        .merge(cart_router(state.clone()))
        .merge(product_router(state.clone()))
        .merge(order_router(state.clone()))
        .merge(uploads_router(state))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Malformed JSON bodies become a 400 with the parser's explanation.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
