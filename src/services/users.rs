use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::entities::{
    cart, cart_item, order, product, role,
    user::{self, Entity as UserEntity, PaymentMethod},
};
use crate::error::{ApiError, ApiResult};
use crate::services::auth::hash_password;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, message = "Username must have at least 3 characters"))]
    pub username: String,
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must have at least 6 characters"))]
    pub password: String,
    #[serde(rename = "rolID")]
    pub role_id: i32,
    #[serde(rename = "provincia")]
    pub province: Option<String>,
    #[serde(rename = "metodoPago")]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserChanges {
    #[validate(length(min = 3, message = "Username must have at least 3 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must have at least 6 characters"))]
    pub password: Option<String>,
    #[serde(rename = "rolID")]
    pub role_id: Option<i32>,
    #[serde(rename = "provincia")]
    pub province: Option<String>,
    #[serde(rename = "metodoPago")]
    pub payment_method: Option<PaymentMethod>,
}

/// Public view of a user; never carries the password hash or the token.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(rename = "rolID")]
    pub role_id: i32,
    #[serde(rename = "provincia")]
    pub province: Option<String>,
    #[serde(rename = "metodoPago")]
    pub payment_method: Option<PaymentMethod>,
}

impl From<user::Model> for UserSummary {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role_id: user.role_id,
            province: user.province,
            payment_method: user.payment_method,
        }
    }
}

pub struct UserService {
    db: Arc<DatabaseConnection>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    pub async fn create(&self, data: NewUser) -> ApiResult<user::Model> {
        data.validate()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;

        let txn = self.db.begin().await?;

        ensure_role(&txn, data.role_id).await?;
        ensure_unique(&txn, Some(&data.username), Some(&data.email), None).await?;

        let user = user::ActiveModel {
            username: Set(data.username),
            email: Set(data.email),
            password: Set(hash_password(&data.password, self.bcrypt_cost)?),
            role_id: Set(data.role_id),
            token: Set(None),
            auth: Set(false),
            province: Set(data.province),
            payment_method: Set(data.payment_method),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(conflict_on_duplicate)?;

        txn.commit().await?;
        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    pub async fn list(&self) -> ApiResult<Vec<user::Model>> {
        Ok(UserEntity::find()
            .order_by_asc(user::Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn find(&self, user_id: i32) -> ApiResult<user::Model> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User with id {user_id} not found")))
    }

    pub async fn update(&self, user_id: i32, changes: UserChanges) -> ApiResult<user::Model> {
        changes
            .validate()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;

        let txn = self.db.begin().await?;

        let existing = UserEntity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User with id {user_id} not found")))?;

        ensure_unique(
            &txn,
            changes.username.as_deref(),
            changes.email.as_deref(),
            Some(user_id),
        )
        .await?;

        let mut user: user::ActiveModel = existing.into();

        if let Some(username) = changes.username {
            user.username = Set(username);
        }
        if let Some(email) = changes.email {
            user.email = Set(email);
        }
        if let Some(password) = changes.password {
            user.password = Set(hash_password(&password, self.bcrypt_cost)?);
        }
        if let Some(role_id) = changes.role_id {
            ensure_role(&txn, role_id).await?;
            user.role_id = Set(role_id);
        }
        if let Some(province) = changes.province {
            user.province = Set(Some(province));
        }
        if let Some(payment_method) = changes.payment_method {
            user.payment_method = Set(Some(payment_method));
        }

        let user = user.update(&txn).await.map_err(conflict_on_duplicate)?;
        txn.commit().await?;
        Ok(user)
    }

    /// The last remaining user can never be removed.
    pub async fn delete(&self, user_id: i32) -> ApiResult<user::Model> {
        let txn = self.db.begin().await?;

        if UserEntity::find().count(&txn).await? <= 1 {
            return Err(ApiError::BadRequest(
                "Cannot delete the only user in the system".to_owned(),
            ));
        }

        let user = UserEntity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User with id {user_id} not found")))?;

        let owns_products = product::Entity::find()
            .filter(product::Column::OwnerId.eq(user_id))
            .count(&txn)
            .await?
            > 0;
        let has_orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .count(&txn)
            .await?
            > 0;
        if owns_products || has_orders {
            return Err(ApiError::Conflict(
                "User still has products or orders".to_owned(),
            ));
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
            cart::Entity::delete_by_id(cart.id).exec(&txn).await?;
        }

        UserEntity::delete_by_id(user_id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(user_id, "User deleted");
        Ok(user)
    }
}

async fn ensure_role<C: ConnectionTrait>(conn: &C, role_id: i32) -> ApiResult<()> {
    role::Entity::find_by_id(role_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::BadRequest(format!("Role {role_id} does not exist")))
}

async fn ensure_unique<C: ConnectionTrait>(
    conn: &C,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i32>,
) -> ApiResult<()> {
    if username.is_none() && email.is_none() {
        return Ok(());
    }

    let mut clash = Condition::any();
    if let Some(username) = username {
        clash = clash.add(user::Column::Username.eq(username));
    }
    if let Some(email) = email {
        clash = clash.add(user::Column::Email.eq(email));
    }

    let mut query = UserEntity::find().filter(clash);
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }

    match query.one(conn).await? {
        Some(_) => Err(ApiError::Conflict(
            "Username or email already in use".to_owned(),
        )),
        None => Ok(()),
    }
}

fn conflict_on_duplicate(err: sea_orm::DbErr) -> ApiError {
    match ApiError::from(err) {
        ApiError::Conflict(_) => ApiError::Conflict("Username or email already in use".to_owned()),
        other => other,
    }
}
