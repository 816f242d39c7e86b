use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use crate::entities::{role, user};
use crate::error::{ApiError, ApiResult};

/// Role checks backed by the `roles` table.
pub struct Authorization {
    db: Arc<DatabaseConnection>,
}

impl Authorization {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn role_name(&self, role_id: i32) -> ApiResult<Option<String>> {
        Ok(role::Entity::find_by_id(role_id)
            .one(&*self.db)
            .await?
            .map(|role| role.name))
    }

    /// An empty `required` set lets everyone through.
    pub async fn check_role(
        &self,
        user: Option<&user::Model>,
        required: &[&str],
    ) -> ApiResult<()> {
        if required.is_empty() {
            return Ok(());
        }

        let user = user.ok_or_else(|| ApiError::Forbidden("Not authorized".to_owned()))?;

        match self.role_name(user.role_id).await? {
            Some(name) if required.contains(&name.as_str()) => Ok(()),
            _ => Err(ApiError::Forbidden("Insufficient role".to_owned())),
        }
    }
}
