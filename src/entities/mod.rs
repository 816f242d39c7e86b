pub mod cart;
pub mod cart_item;
pub mod image;
pub mod order;
pub mod order_line;
pub mod product;
pub mod province_price;
pub mod role;
pub mod user;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Schema, Set, TransactionTrait,
};

/// Creates every table that does not exist yet, parents before children.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(role::Entity),
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(province_price::Entity),
        schema.create_table_from_entity(image::Entity),
        schema.create_table_from_entity(cart::Entity),
        schema.create_table_from_entity(cart_item::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_line::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    Ok(())
}

/// Inserts the reference roles. Safe to call on every start.
pub async fn seed_roles(db: &DatabaseConnection) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    for name in [role::USER, role::MERCHANT] {
        let existing = role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(&txn)
            .await?;

        if existing.is_none() {
            role::ActiveModel {
                name: Set(name.to_owned()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await
}
