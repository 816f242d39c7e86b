use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, LoaderTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::entities::{
    cart_item, image,
    product::{self, Entity as ProductEntity},
    province_price, user,
};
use crate::error::{ApiError, ApiResult};
use crate::services::images::ImageStore;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub name: Option<String>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvincePriceInput {
    #[serde(rename = "provincia")]
    pub province: String,
    #[serde(rename = "precio")]
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub stock: i32,
    pub province_prices: Vec<ProvincePriceInput>,
}

/// A product together with its images and province prices.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    #[serde(rename = "imagenes")]
    pub images: Vec<image::Model>,
    #[serde(rename = "precios")]
    pub prices: Vec<province_price::Model>,
}

pub struct ProductService {
    db: Arc<DatabaseConnection>,
    images: Arc<ImageStore>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, images: Arc<ImageStore>) -> Self {
        Self { db, images }
    }

    /// Newest first. The name match ignores case.
    pub async fn list(&self, filter: &ProductFilter) -> ApiResult<Vec<ProductDetail>> {
        let mut query = ProductEntity::find();

        if let Some(name) = filter.name.as_deref().filter(|name| !name.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(&name.trim().to_lowercase()));
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }

        if let Some(max_price) = filter.max_price {
            query = query.filter(product::Column::Price.lte(max_price));
        }

        let products = query
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .all(&*self.db)
            .await?;

        with_children(products, &*self.db).await
    }

    pub async fn list_by_owner(&self, owner_id: i32) -> ApiResult<Vec<ProductDetail>> {
        let products = ProductEntity::find()
            .filter(product::Column::OwnerId.eq(owner_id))
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .all(&*self.db)
            .await?;

        with_children(products, &*self.db).await
    }

    pub async fn find(&self, product_id: i32) -> ApiResult<ProductDetail> {
        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Product with id {product_id} not found")))?;

        with_children(vec![product], &*self.db)
            .await?
            .pop()
            .ok_or_else(|| ApiError::Internal("Product vanished while loading".to_owned()))
    }

    /// `image_urls` point at files the image store already holds; the first
    /// one becomes the product's main image.
    pub async fn create(
        &self,
        owner_id: i32,
        data: NewProduct,
        image_urls: Vec<String>,
    ) -> ApiResult<ProductDetail> {
        if data.name.trim().is_empty() {
            return Err(ApiError::BadRequest("Product name is required".to_owned()));
        }
        if !valid_price(data.price) || data.stock < 0 {
            return Err(ApiError::BadRequest(
                "Price must be a finite number and stock cannot be negative".to_owned(),
            ));
        }
        if data
            .province_prices
            .iter()
            .any(|input| !valid_price(input.price))
        {
            return Err(ApiError::BadRequest(
                "Province prices must be finite and not negative".to_owned(),
            ));
        }

        let txn = self.db.begin().await?;

        user::Entity::find_by_id(owner_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Merchant user not found".to_owned()))?;

        let now = Utc::now();
        let product = product::ActiveModel {
            name: Set(data.name),
            description: Set(data.description),
            category: Set(data.category),
            price: Set(data.price),
            stock: Set(data.stock),
            image_url: Set(image_urls.first().cloned().unwrap_or_default()),
            owner_id: Set(owner_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut prices = Vec::with_capacity(data.province_prices.len());
        for input in data.province_prices {
            let price = province_price::ActiveModel {
                product_id: Set(product.id),
                province: Set(input.province),
                price: Set(input.price),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            prices.push(price);
        }

        let images = insert_images(&txn, product.id, &image_urls).await?;

        txn.commit().await?;
        tracing::info!(product_id = product.id, owner_id, "Product created");

        Ok(ProductDetail {
            product,
            images,
            prices,
        })
    }

    /// Fails with Forbidden unless `caller_id` published the product.
    pub async fn owned(&self, product_id: i32, caller_id: i32) -> ApiResult<product::Model> {
        owned_product(&*self.db, product_id, caller_id).await
    }

    pub async fn update_stock(
        &self,
        product_id: i32,
        stock: i32,
        caller_id: i32,
    ) -> ApiResult<product::Model> {
        let product = self.owned(product_id, caller_id).await?;

        if stock < 0 {
            return Err(ApiError::BadRequest("Stock cannot be negative".to_owned()));
        }

        let mut product: product::ActiveModel = product.into();
        product.stock = Set(stock);
        product.updated_at = Set(Utc::now());
        Ok(product.update(&*self.db).await?)
    }

    /// Removes images, province prices and cart lines before the product
    /// row. Image files go last and failures there are ignored.
    pub async fn delete(&self, product_id: i32, caller_id: i32) -> ApiResult<product::Model> {
        let txn = self.db.begin().await?;
        let product = owned_product(&txn, product_id, caller_id).await?;

        let urls: Vec<String> = product
            .find_related(image::Entity)
            .all(&txn)
            .await?
            .into_iter()
            .map(|image| image.url)
            .collect();

        image::Entity::delete_many()
            .filter(image::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        province_price::Entity::delete_many()
            .filter(province_price::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        product.clone().delete(&txn).await?;

        txn.commit().await?;
        self.images.remove_all(&urls).await;

        tracing::info!(product_id, owner_id = caller_id, "Product deleted");
        Ok(product)
    }

    pub async fn add_images(
        &self,
        product_id: i32,
        image_urls: &[String],
        caller_id: i32,
    ) -> ApiResult<Vec<image::Model>> {
        let txn = self.db.begin().await?;
        let product = owned_product(&txn, product_id, caller_id).await?;

        let images = insert_images(&txn, product_id, image_urls).await?;

        if product.image_url.is_empty() {
            if let Some(first) = images.first() {
                let mut product: product::ActiveModel = product.into();
                product.image_url = Set(first.url.clone());
                product.updated_at = Set(Utc::now());
                product.update(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(images)
    }

    pub async fn delete_image(
        &self,
        product_id: i32,
        image_id: i32,
        caller_id: i32,
    ) -> ApiResult<image::Model> {
        let txn = self.db.begin().await?;

        let (image, product) = match image::Entity::find_by_id(image_id)
            .find_also_related(ProductEntity)
            .one(&txn)
            .await?
        {
            Some((image, Some(product)))
                if image.product_id == product_id && product.owner_id == caller_id =>
            {
                (image, product)
            }
            _ => {
                return Err(ApiError::Forbidden(
                    "Not authorized or image does not exist".to_owned(),
                ))
            }
        };

        image.clone().delete(&txn).await?;

        if product.image_url == image.url {
            let next = image::Entity::find()
                .filter(image::Column::ProductId.eq(product_id))
                .order_by_asc(image::Column::Id)
                .one(&txn)
                .await?
                .map(|next| next.url)
                .unwrap_or_default();

            let mut product: product::ActiveModel = product.into();
            product.image_url = Set(next);
            product.updated_at = Set(Utc::now());
            product.update(&txn).await?;
        }

        txn.commit().await?;
        self.images.remove(&image.url).await;
        Ok(image)
    }
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}

/// Makes `%`, `_` and `\` match literally in a LIKE pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

async fn owned_product<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    caller_id: i32,
) -> ApiResult<product::Model> {
    match ProductEntity::find_by_id(product_id).one(conn).await? {
        Some(product) if product.owner_id == caller_id => Ok(product),
        _ => Err(ApiError::Forbidden(
            "Not authorized or product does not exist".to_owned(),
        )),
    }
}

async fn insert_images<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    urls: &[String],
) -> ApiResult<Vec<image::Model>> {
    let mut images = Vec::with_capacity(urls.len());
    for url in urls {
        let image = image::ActiveModel {
            product_id: Set(product_id),
            url: Set(url.clone()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        images.push(image);
    }
    Ok(images)
}

async fn with_children<C: ConnectionTrait>(
    products: Vec<product::Model>,
    conn: &C,
) -> ApiResult<Vec<ProductDetail>> {
    let images = products.load_many(image::Entity, conn).await?;
    let prices = products.load_many(province_price::Entity, conn).await?;

    Ok(products
        .into_iter()
        .zip(images)
        .zip(prices)
        .map(|((product, images), prices)| ProductDetail {
            product,
            images,
            prices,
        })
        .collect())
}
