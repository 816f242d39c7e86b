use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub price: f64,
    #[serde(rename = "categoria")]
    pub category: String,
    pub stock: i32,
    pub image_url: String,
    #[serde(rename = "publicadoPor")]
    pub owner_id: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::user::Entity",
        from = "Column::OwnerId",
        to = "crate::entities::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Owner,
    #[sea_orm(has_many = "crate::entities::image::Entity")]
    Image,
    #[sea_orm(has_many = "crate::entities::province_price::Entity")]
    ProvincePrice,
}

impl Related<crate::entities::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<crate::entities::image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Image.def()
    }
}

impl Related<crate::entities::province_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProvincePrice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
