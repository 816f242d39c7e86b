use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::entities::user::{self, Entity as UserEntity};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{generate_token, validate_token};

pub struct AuthService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: user::Model,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    pub fn token_ttl_minutes(&self) -> i64 {
        self.config.token_ttl_minutes
    }

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginOutcome> {
        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_owned()))?;

        if !verify_password(password, &user.password)? {
            tracing::info!(user_id = user.id, "Rejected login with a wrong password");
            return Err(ApiError::Unauthorized("Incorrect password".to_owned()));
        }

        let token = generate_token(&user, &self.config.jwt_secret, self.config.token_ttl_minutes)?;

        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(token.clone()));
        active.auth = Set(true);
        let user = active.update(&*self.db).await?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome { token, user })
    }

    /// Clears the stored session. Calling it again leaves the same state.
    pub async fn logout(&self, email: &str) -> ApiResult<()> {
        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_owned()))?;

        let user_id = user.id;
        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(String::new()));
        active.auth = Set(false);
        active.update(&*self.db).await?;

        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Resolves a presented token to its user. The token has to be the one
    /// stored at the last login, so a logout revokes it.
    pub async fn authenticate(&self, token: &str) -> ApiResult<user::Model> {
        let claims = validate_token(token, &self.config.jwt_secret)?;

        let user = UserEntity::find_by_id(claims.user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_owned()))?;

        if !user.holds_session(token) {
            return Err(ApiError::Unauthorized(
                "Session is no longer active".to_owned(),
            ));
        }

        Ok(user)
    }
}

pub fn hash_password(password: &str, cost: u32) -> ApiResult<String> {
    bcrypt::hash(password, cost)
        .map_err(|err| ApiError::Internal(format!("Failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    bcrypt::verify(password, hash)
        .map_err(|err| ApiError::Internal(format!("Stored password hash is unusable: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_hashed_password() {
        let hash = hash_password("Muzion15", 4).unwrap();

        assert!(verify_password("Muzion15", &hash).unwrap());
        assert!(!verify_password("muzion15", &hash).unwrap());
        assert!(verify_password("Muzion15", "not-a-hash").is_err());
    }
}
