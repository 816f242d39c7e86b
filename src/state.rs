use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    auth::AuthService, authorization::Authorization, cart::CartService, images::ImageStore,
    order::OrderService, product::ProductService, users::UserService,
};

/// Shared by every router; built once at start-up from the database handle
/// and the configuration.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub authorization: Arc<Authorization>,
    pub users: Arc<UserService>,
    pub carts: Arc<CartService>,
    pub products: Arc<ProductService>,
    pub orders: Arc<OrderService>,
    pub images: Arc<ImageStore>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig) -> Self {
        let config = Arc::new(config);
        let images = Arc::new(ImageStore::new(
            config.upload_dir.clone(),
            config.file_size_limit,
        ));

        Self {
            auth: Arc::new(AuthService::new(db.clone(), config.clone())),
            authorization: Arc::new(Authorization::new(db.clone())),
            users: Arc::new(UserService::new(db.clone(), config.bcrypt_cost)),
            carts: Arc::new(CartService::new(db.clone())),
            products: Arc::new(ProductService::new(db.clone(), images.clone())),
            orders: Arc::new(OrderService::new(db)),
            images,
            config,
        }
    }
}
