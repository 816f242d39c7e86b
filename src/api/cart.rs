use axum::{
    extract::{rejection::JsonRejection, Extension},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::{json_body, AUTHENTICATED};
use crate::error::ApiResult;
use crate::middleware::auth::{auth_middleware, AuthState, CurrentUser};
use crate::services::cart::{CartChange, CartSummary};
use crate::state::AppState;

pub fn cart_router(state: AppState) -> Router {
    Router::new()
        .route("/carrito/agregar", post(set_item))
        .route("/carrito/resumen", get(get_summary))
        .route_layer(from_fn_with_state(
            AuthState::new(state.clone(), AUTHENTICATED),
            auth_middleware,
        ))
        .layer(Extension(state))
}

async fn set_item(
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<CartItemPayload>, JsonRejection>,
) -> ApiResult<Json<CartChange>> {
    let payload = json_body(payload)?;
    let change = state
        .carts
        .set_item_quantity(user.id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(change))
}

async fn get_summary(
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<CartSummary>> {
    Ok(Json(state.carts.summary(user.id).await?))
}

#[derive(Debug, Deserialize)]
struct CartItemPayload {
    #[serde(rename = "productId")]
    product_id: i32,
    #[serde(rename = "cantidad")]
    quantity: i32,
}
