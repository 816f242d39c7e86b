use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;

use crate::entities::{cart, cart_item, product, user, user::PaymentMethod};
use crate::error::{ApiError, ApiResult};

pub const FREE_SHIPPING_THRESHOLD: f64 = 100.0;
pub const FLAT_SHIPPING_COST: f64 = 10.0;

/// Shipping is free strictly above the threshold.
pub fn shipping_cost(subtotal: f64) -> f64 {
    if subtotal > FREE_SHIPPING_THRESHOLD {
        0.0
    } else {
        FLAT_SHIPPING_COST
    }
}

/// What a quantity change did to the cart.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CartChange {
    Saved(cart_item::Model),
    Removed(cart_item::Model),
    Unchanged { message: String },
}

#[derive(Debug, Serialize)]
pub struct CartSummaryItem {
    #[serde(rename = "productId")]
    pub product_id: i32,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "imagen")]
    pub image: String,
    #[serde(rename = "precioUnitario")]
    pub unit_price: f64,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartSummaryItem>,
    pub subtotal: f64,
    #[serde(rename = "envio")]
    pub shipping: f64,
    pub total: f64,
    #[serde(rename = "metodoPago")]
    pub payment_method: Option<PaymentMethod>,
}

pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Sets the line for `product_id` to exactly `quantity`; zero removes it.
    pub async fn set_item_quantity(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> ApiResult<CartChange> {
        if quantity < 0 {
            return Err(ApiError::BadRequest(
                "Quantity cannot be negative".to_owned(),
            ));
        }

        let txn = self.db.begin().await?;

        product::Entity::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Product with id {product_id} not found")))?;

        let cart = match cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            Some(cart) => cart,
            None => {
                cart::ActiveModel {
                    user_id: Set(user_id),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let change = match (quantity, existing) {
            (0, None) => CartChange::Unchanged {
                message: "No item to remove".to_owned(),
            },
            (0, Some(item)) => {
                item.clone().delete(&txn).await?;
                CartChange::Removed(item)
            }
            (_, Some(item)) => {
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(quantity);
                CartChange::Saved(item.update(&txn).await?)
            }
            (_, None) => CartChange::Saved(
                cart_item::ActiveModel {
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    ..Default::default()
                }
                .insert(&txn)
                .await?,
            ),
        };

        txn.commit().await?;
        Ok(change)
    }

    pub async fn summary(&self, user_id: i32) -> ApiResult<CartSummary> {
        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Cart not found".to_owned()))?;

        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::Id)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        let items: Vec<CartSummaryItem> = lines
            .into_iter()
            .filter_map(|(item, product)| {
                let product = product?;
                Some(CartSummaryItem {
                    product_id: product.id,
                    total: product.price * f64::from(item.quantity),
                    name: product.name,
                    image: product.image_url,
                    unit_price: product.price,
                    quantity: item.quantity,
                })
            })
            .collect();

        let subtotal: f64 = items.iter().map(|item| item.total).sum();
        let shipping = shipping_cost(subtotal);

        let payment_method = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .and_then(|user| user.payment_method);

        Ok(CartSummary {
            items,
            subtotal,
            shipping,
            total: subtotal + shipping,
            payment_method,
        })
    }
}
