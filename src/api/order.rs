use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::{json_body, AUTHENTICATED, MERCHANT_ONLY};
use crate::entities::{order, user};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{auth_middleware, AuthState, CurrentUser};
use crate::services::order::{OrderDetail, OrderLineRequest};
use crate::state::AppState;

pub fn order_router(state: AppState) -> Router {
    let authenticated = from_fn_with_state(
        AuthState::new(state.clone(), AUTHENTICATED),
        auth_middleware,
    );
    let merchant = from_fn_with_state(
        AuthState::new(state.clone(), MERCHANT_ONLY),
        auth_middleware,
    );

    Router::new()
        .route(
            "/order",
            post(create_order)
                .layer(authenticated.clone())
                .merge(get(get_all_orders).layer(merchant)),
        )
        .route(
            "/order/user/:user_id",
            get(get_user_orders).layer(authenticated.clone()),
        )
        .route(
            "/order/:order_id",
            get(get_order).delete(delete_order).layer(authenticated),
        )
        .layer(Extension(state))
}

async fn create_order(
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<CreateOrderPayload>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let payload = json_body(payload)?;
    if payload.user_id != user.id {
        return Err(ApiError::Forbidden(
            "Orders can only be placed for the authenticated user".to_owned(),
        ));
    }

    let order = state.orders.create(payload.user_id, &payload.products).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_all_orders(Extension(state): Extension<AppState>) -> ApiResult<Json<Vec<OrderDetail>>> {
    Ok(Json(state.orders.all().await?))
}

async fn get_user_orders(
    Path(user_id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<OrderDetail>>> {
    ensure_visible(&state, &caller, user_id).await?;
    Ok(Json(state.orders.by_user(user_id).await?))
}

async fn get_order(
    Path(order_id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
) -> ApiResult<Json<OrderDetail>> {
    let order = state.orders.by_id(order_id).await?;
    ensure_visible(&state, &caller, order.order.user_id).await?;
    Ok(Json(order))
}

async fn delete_order(
    Path(order_id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
) -> ApiResult<Json<order::Model>> {
    let order = state.orders.header(order_id).await?;
    ensure_visible(&state, &caller, order.user_id).await?;
    Ok(Json(state.orders.delete(order_id).await?))
}

/// Buyers see their own orders, merchants see all of them.
async fn ensure_visible(state: &AppState, caller: &user::Model, owner_id: i32) -> ApiResult<()> {
    if caller.id == owner_id {
        return Ok(());
    }
    state
        .authorization
        .check_role(Some(caller), MERCHANT_ONLY)
        .await
}

#[derive(Debug, Deserialize)]
struct CreateOrderPayload {
    #[serde(rename = "userID")]
    user_id: i32,
    products: Vec<OrderLineRequest>,
}
