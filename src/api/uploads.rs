use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn uploads_router(state: AppState) -> Router {
    Router::new()
        .route("/uploads/:file_name", get(print_image))
        .layer(Extension(state))
}

pub async fn print_image(
    Path(file_name): Path<String>,
    Extension(state): Extension<AppState>,
) -> ApiResult<impl IntoResponse> {
    let not_found = || ApiError::NotFound("Image not found".to_owned());

    let path = state.images.resolve(&file_name).ok_or_else(not_found)?;
    let file = tokio::fs::File::open(&path).await.map_err(|_| not_found())?;

    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let body = Body::from_stream(ReaderStream::new(file));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    Ok((headers, body))
}
