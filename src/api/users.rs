use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::{json_body, AUTHENTICATED};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{auth_middleware, AuthState, CurrentUser};
use crate::services::users::{NewUser, UserChanges, UserSummary};
use crate::state::AppState;

pub fn users_router(state: AppState) -> Router {
    let authenticated = from_fn_with_state(
        AuthState::new(state.clone(), AUTHENTICATED),
        auth_middleware,
    );

    Router::new()
        .route(
            "/users",
            post(register).merge(get(list_users).layer(authenticated.clone())),
        )
        .route(
            "/users/:id",
            get(get_user)
                .patch(update_user)
                .delete(delete_user)
                .layer(authenticated),
        )
        .layer(Extension(state))
}

async fn register(
    Extension(state): Extension<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let payload = json_body(payload)?;
    let user = state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(UserSummary::from(user))))
}

async fn list_users(Extension(state): Extension<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

async fn get_user(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<UserSummary>> {
    Ok(Json(state.users.find(id).await?.into()))
}

async fn update_user(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    payload: Result<Json<UserChanges>, JsonRejection>,
) -> ApiResult<Json<UserSummary>> {
    ensure_self(caller.id, id)?;
    let payload = json_body(payload)?;
    Ok(Json(state.users.update(id, payload).await?.into()))
}

async fn delete_user(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
) -> ApiResult<Json<UserSummary>> {
    ensure_self(caller.id, id)?;
    Ok(Json(state.users.delete(id).await?.into()))
}

fn ensure_self(caller_id: i32, target_id: i32) -> ApiResult<()> {
    if caller_id == target_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Users can only change their own account".to_owned(),
        ))
    }
}
