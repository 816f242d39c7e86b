use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Extension, Multipart,
        Path, Query,
    },
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::{json_body, MERCHANT_ONLY};
use crate::entities::{image, product};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{auth_middleware, AuthState, CurrentUser};
use crate::services::images::{ImageStore, MAX_IMAGES_PER_REQUEST};
use crate::services::product::{NewProduct, ProductDetail, ProductFilter, ProvincePriceInput};
use crate::state::AppState;

const IMAGE_FIELD: &str = "imagenes";

//ROUTERS
pub fn product_router(state: AppState) -> Router {
    let merchant = from_fn_with_state(
        AuthState::new(state.clone(), MERCHANT_ONLY),
        auth_middleware,
    );
    // Room for a full batch of images plus the text fields.
    let body_limit = state.images.size_limit() * MAX_IMAGES_PER_REQUEST + 1024 * 1024;

    Router::new()
        .route(
            "/products",
            get(get_products).merge(post(create_product).layer(merchant.clone())),
        )
        .route(
            "/products/my-products",
            get(get_my_products).layer(merchant.clone()),
        )
        .route(
            "/products/:id",
            get(get_product).merge(delete(delete_product).layer(merchant.clone())),
        )
        .route(
            "/products/:id/stock",
            patch(patch_stock).layer(merchant.clone()),
        )
        .route(
            "/products/:id/images",
            post(add_images).layer(merchant.clone()),
        )
        .route(
            "/products/:id/images/:image_id",
            delete(delete_image).layer(merchant),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state))
}

//ROUTES
async fn get_products(
    Query(filter): Query<ProductFilter>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Vec<ProductDetail>>> {
    Ok(Json(state.products.list(&filter).await?))
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<ProductDetail>> {
    Ok(Json(state.products.find(id).await?))
}

async fn get_my_products(
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<ProductDetail>>> {
    Ok(Json(state.products.list_by_owner(user.id).await?))
}

async fn create_product(
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = ProductForm::read(multipart).await?;
    let data = form.new_product()?;

    let urls = store_images(&state.images, form.images).await?;
    match state.products.create(user.id, data, urls.clone()).await {
        Ok(product) => Ok((StatusCode::CREATED, Json(product))),
        Err(err) => {
            state.images.remove_all(&urls).await;
            Err(err)
        }
    }
}

async fn patch_stock(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<StockPayload>, JsonRejection>,
) -> ApiResult<Json<product::Model>> {
    let payload = json_body(payload)?;
    Ok(Json(
        state
            .products
            .update_stock(id, payload.stock, user.id)
            .await?,
    ))
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<product::Model>> {
    Ok(Json(state.products.delete(id, user.id).await?))
}

async fn add_images(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    state.products.owned(id, user.id).await?;

    let form = ProductForm::read(multipart).await?;
    if form.images.is_empty() {
        return Err(ApiError::BadRequest("No images were sent".to_owned()));
    }

    let urls = store_images(&state.images, form.images).await?;
    match state.products.add_images(id, &urls, user.id).await {
        Ok(images) => Ok((StatusCode::CREATED, Json(images))),
        Err(err) => {
            state.images.remove_all(&urls).await;
            Err(err)
        }
    }
}

async fn delete_image(
    Path((id, image_id)): Path<(i32, i32)>,
    Extension(state): Extension<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<image::Model>> {
    Ok(Json(state.products.delete_image(id, image_id, user.id).await?))
}

//HELPERS
#[derive(Debug, Deserialize)]
struct StockPayload {
    stock: i32,
}

struct ImageUpload {
    content_type: String,
    data: Bytes,
}

/// Text fields and image files of a product multipart form.
struct ProductForm {
    fields: HashMap<String, String>,
    images: Vec<ImageUpload>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut fields = HashMap::new();
        let mut images = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_owned();

            if name != IMAGE_FIELD {
                let value = field.text().await.map_err(multipart_error)?;
                fields.insert(name, value);
                continue;
            }

            if images.len() == MAX_IMAGES_PER_REQUEST {
                return Err(ApiError::BadRequest(format!(
                    "At most {MAX_IMAGES_PER_REQUEST} images can be uploaded at once"
                )));
            }

            let content_type = field
                .content_type()
                .filter(|content_type| ImageStore::extension_for(content_type).is_some())
                .map(str::to_owned)
                .ok_or_else(|| {
                    ApiError::BadRequest("Only JPG, PNG or GIF images are allowed".to_owned())
                })?;
            let data = field.bytes().await.map_err(multipart_error)?;

            images.push(ImageUpload { content_type, data });
        }

        Ok(Self { fields, images })
    }

    fn new_product(&mut self) -> ApiResult<NewProduct> {
        let price = self
            .number("precioGeneral")
            .ok_or_else(|| ApiError::BadRequest("precioGeneral must be a number".to_owned()))?;
        let stock = self
            .number("stock")
            .ok_or_else(|| ApiError::BadRequest("stock must be an integer".to_owned()))?;

        let province_prices: Vec<ProvincePriceInput> = match self.fields.get("preciosPorProvincia")
        {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw).map_err(|_| {
                ApiError::BadRequest("preciosPorProvincia must be a JSON array".to_owned())
            })?,
            _ => Vec::new(),
        };

        Ok(NewProduct {
            name: self.fields.remove("name").unwrap_or_default(),
            description: self.fields.remove("description").unwrap_or_default(),
            category: self.fields.remove("categoria").unwrap_or_default(),
            price,
            stock,
            province_prices,
        })
    }

    fn number<T: std::str::FromStr>(&self, field: &str) -> Option<T> {
        self.fields.get(field)?.trim().parse().ok()
    }
}

/// Writes every upload to the store; on failure the files already written
/// are removed again.
async fn store_images(store: &ImageStore, uploads: Vec<ImageUpload>) -> ApiResult<Vec<String>> {
    let mut urls = Vec::with_capacity(uploads.len());

    for upload in uploads {
        match store.save(&upload.content_type, &upload.data).await {
            Ok(url) => urls.push(url),
            Err(err) => {
                store.remove_all(&urls).await;
                return Err(err);
            }
        }
    }

    Ok(urls)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
