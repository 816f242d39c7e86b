#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use mercado_backend::{create_api_router, init_database, AppConfig, AppState};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

pub const USER_ROLE: i32 = 1;
pub const MERCHANT_ROLE: i32 = 2;
pub const PASSWORD: &str = "Muzion15";

/// A server on an ephemeral port backed by its own in-memory database.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub upload_dir: PathBuf,
}

pub async fn spawn_app() -> TestApp {
    let upload_dir = std::env::temp_dir().join(format!("mercado-uploads-{}", Uuid::new_v4()));
    let config = AppConfig {
        database_url: "sqlite::memory:".to_owned(),
        bind_address: "127.0.0.1:0".to_owned(),
        jwt_secret: "test-secret".to_owned(),
        token_ttl_minutes: 10,
        upload_dir: upload_dir.clone(),
        file_size_limit: 1024 * 1024,
        bcrypt_cost: 4,
    };

    let db = init_database(&config.database_url)
        .await
        .expect("Failed to initialise database");
    let app = create_api_router(AppState::new(Arc::new(db), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!(
        "http://{}",
        listener.local_addr().expect("Listener has no address")
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server crashed");
    });

    TestApp {
        address,
        client: Client::new(),
        upload_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str, role_id: i32) -> Response {
        self.client
            .post(self.url("/users"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
                "rolID": role_id,
                "provincia": "La Habana",
                "metodoPago": "TARJETA"
            }))
            .send()
            .await
            .expect("Failed to send register request")
    }

    /// Registers a user and returns `(id, token)`.
    pub async fn signed_in(&self, username: &str, role_id: i32) -> (i32, String) {
        let response = self.register(username, role_id).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let user: Value = response.json().await.expect("Invalid register JSON");
        let id = user["id"].as_i64().expect("User id missing") as i32;

        (id, self.login(username).await)
    }

    pub async fn login(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({
                "email": format!("{username}@example.com"),
                "password": PASSWORD
            }))
            .send()
            .await
            .expect("Failed to send login request");
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.expect("Invalid login JSON");
        body["access_token"]
            .as_str()
            .expect("Token not found in login response")
            .to_owned()
    }

    /// Publishes a product with one PNG image and returns its JSON.
    pub async fn create_product(&self, token: &str, name: &str, price: f64, stock: i32) -> Value {
        let response = self
            .client
            .post(self.url("/products"))
            .bearer_auth(token)
            .multipart(product_form(name, price, stock))
            .send()
            .await
            .expect("Failed to send create product request");
        assert_eq!(response.status(), StatusCode::CREATED);

        response.json().await.expect("Invalid product JSON")
    }

    pub async fn set_cart_item(&self, token: &str, product_id: i64, quantity: i32) -> Response {
        self.client
            .post(self.url("/carrito/agregar"))
            .bearer_auth(token)
            .json(&json!({ "productId": product_id, "cantidad": quantity }))
            .send()
            .await
            .expect("Failed to send cart request")
    }

    pub async fn get_json(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.expect("Failed to send GET request");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

pub fn png_part(file_name: &str) -> Part {
    Part::bytes(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
        .file_name(file_name.to_owned())
        .mime_str("image/png")
        .expect("Invalid mime type")
}

pub fn product_form(name: &str, price: f64, stock: i32) -> Form {
    Form::new()
        .text("name", name.to_owned())
        .text("description", format!("{name} description"))
        .text("categoria", "Alimentos")
        .text("precioGeneral", price.to_string())
        .text("stock", stock.to_string())
        .text(
            "preciosPorProvincia",
            r#"[{"provincia":"La Habana","precio":55.5},{"provincia":"Matanzas","precio":58}]"#,
        )
        .part("imagenes", png_part("front.png"))
}
