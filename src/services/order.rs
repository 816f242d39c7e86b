use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, LoaderTrait, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{cart, cart_item, order, order_line, product, user};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderLineRequest {
    #[serde(rename = "productId")]
    pub product_id: i32,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct OrderUser {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductSnapshot {
    pub id: i32,
    pub name: String,
    pub price: f64,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct OrderLineDetail {
    #[serde(flatten)]
    pub line: order_line::Model,
    /// `None` once the product has been removed from the catalog.
    pub product: Option<ProductSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<OrderUser>,
    pub products: Vec<OrderLineDetail>,
}

/// Which user fields an order listing exposes.
#[derive(Clone, Copy)]
enum UserView {
    Hidden,
    Name,
    NameAndEmail,
}

pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Places an order for `user_id`.
    ///
    /// Lines are validated in the given order, then the header, lines and
    /// stock decrements are written and the user's cart is emptied. Every
    /// step shares one transaction, and each decrement only applies while
    /// enough stock is left, so a failure at any point leaves nothing behind
    /// and concurrent orders cannot oversell.
    pub async fn create(
        &self,
        user_id: i32,
        lines: &[OrderLineRequest],
    ) -> ApiResult<order::Model> {
        let txn = self.db.begin().await?;

        user::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::BadRequest("User not found".to_owned()))?;

        if lines.is_empty() {
            return Err(ApiError::BadRequest(
                "The product list cannot be empty".to_owned(),
            ));
        }

        let mut priced = Vec::with_capacity(lines.len());
        let mut total = 0.0;
        for line in lines {
            if line.quantity <= 0 {
                return Err(ApiError::BadRequest(
                    "Quantity must be greater than zero".to_owned(),
                ));
            }

            let product = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Product with id {} not found", line.product_id))
                })?;

            if product.stock < line.quantity {
                return Err(insufficient_stock(line, product.stock));
            }

            total += product.price * f64::from(line.quantity);
            priced.push((*line, product));
        }

        let order = order::ActiveModel {
            user_id: Set(user_id),
            total: Set(total),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (line, product) in &priced {
            order_line::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                unit_price: Set(product.price),
                quantity: Set(line.quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let decremented = product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(line.quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(product::Column::Id.eq(product.id))
                .filter(product::Column::Stock.gte(line.quantity))
                .exec(&txn)
                .await?;

            if decremented.rows_affected == 0 {
                let available = product::Entity::find_by_id(product.id)
                    .one(&txn)
                    .await?
                    .map_or(0, |product| product.stock);
                return Err(insufficient_stock(line, available));
            }
        }

        if let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        tracing::info!(order_id = order.id, user_id, total, "Order placed");

        Ok(order)
    }

    pub async fn by_user(&self, user_id: i32) -> ApiResult<Vec<OrderDetail>> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_owned()))?;

        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(&*self.db)
            .await?;

        with_details(orders, UserView::Hidden, &*self.db).await
    }

    /// The order row alone, without lines or buyer.
    pub async fn header(&self, order_id: i32) -> ApiResult<order::Model> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Order not found".to_owned()))
    }

    pub async fn by_id(&self, order_id: i32) -> ApiResult<OrderDetail> {
        let order = self.header(order_id).await?;

        with_details(vec![order], UserView::NameAndEmail, &*self.db)
            .await?
            .pop()
            .ok_or_else(|| ApiError::Internal("Order vanished while loading".to_owned()))
    }

    pub async fn all(&self) -> ApiResult<Vec<OrderDetail>> {
        let orders = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(&*self.db)
            .await?;

        with_details(orders, UserView::Name, &*self.db).await
    }

    /// Lines go before the header.
    pub async fn delete(&self, order_id: i32) -> ApiResult<order::Model> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound("Order not found".to_owned()))?;

        order_line::Entity::delete_many()
            .filter(order_line::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order.clone().delete(&txn).await?;

        txn.commit().await?;
        tracing::info!(order_id, "Order deleted");
        Ok(order)
    }
}

fn insufficient_stock(line: &OrderLineRequest, available: i32) -> ApiError {
    ApiError::BadRequest(format!(
        "Insufficient stock for product {} (requested={}, available={})",
        line.product_id, line.quantity, available
    ))
}

async fn with_details<C: ConnectionTrait>(
    orders: Vec<order::Model>,
    view: UserView,
    conn: &C,
) -> ApiResult<Vec<OrderDetail>> {
    let lines = orders.load_many(order_line::Entity, conn).await?;
    let users = match view {
        UserView::Hidden => vec![None; orders.len()],
        UserView::Name | UserView::NameAndEmail => orders.load_one(user::Entity, conn).await?,
    };

    let product_ids: Vec<i32> = lines
        .iter()
        .flatten()
        .map(|line| line.product_id)
        .collect();
    let products: HashMap<i32, product::Model> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect()
    };

    Ok(orders
        .into_iter()
        .zip(lines)
        .zip(users)
        .map(|((order, lines), owner)| OrderDetail {
            order,
            user: owner.map(|owner| OrderUser {
                id: owner.id,
                username: owner.username,
                email: matches!(view, UserView::NameAndEmail).then_some(owner.email),
            }),
            products: lines
                .into_iter()
                .map(|line| OrderLineDetail {
                    product: products.get(&line.product_id).map(|product| ProductSnapshot {
                        id: product.id,
                        name: product.name.clone(),
                        price: product.price,
                        image_url: product.image_url.clone(),
                    }),
                    line,
                })
                .collect(),
        })
        .collect())
}
