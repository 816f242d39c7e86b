use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role_id: i32,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    #[sea_orm(default = false)]
    pub auth: bool,
    pub province: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// A session is live only while the user is flagged as authenticated
    /// and the presented token is the one issued at the last login.
    pub fn holds_session(&self, token: &str) -> bool {
        self.auth && self.token.as_deref() == Some(token)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::role::Entity",
        from = "Column::RoleId",
        to = "crate::entities::role::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Role,
    #[sea_orm(has_one = "crate::entities::cart::Entity")]
    Cart,
}

impl Related<crate::entities::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl Related<crate::entities::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    enum_name = "payment_method_enum",
    db_type = "String(StringLen::N(32))",
    rs_type = "String"
)]
pub enum PaymentMethod {
    #[sea_orm(string_value = "EFECTIVO")]
    #[serde(rename = "EFECTIVO")]
    Cash,
    #[sea_orm(string_value = "TRANSFERENCIA")]
    #[serde(rename = "TRANSFERENCIA")]
    Transfer,
    #[sea_orm(string_value = "TARJETA")]
    #[serde(rename = "TARJETA")]
    Card,
}
