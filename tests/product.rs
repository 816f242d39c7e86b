mod common;

use common::{png_part, product_form, spawn_app, MERCHANT_ROLE, USER_ROLE};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_create_product_with_images_and_prices() {
    let app = spawn_app().await;
    let (merchant_id, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;

    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;

    assert_eq!(product["name"], "Cafe");
    assert_eq!(product["categoria"], "Alimentos");
    assert_eq!(product["price"], 60.0);
    assert_eq!(product["stock"], 10);
    assert_eq!(product["publicadoPor"], merchant_id);
    assert_eq!(product["precios"].as_array().map(Vec::len), Some(2));
    assert_eq!(product["precios"][0]["provincia"], "La Habana");

    let images = product["imagenes"].as_array().expect("Images missing");
    assert_eq!(images.len(), 1);
    assert_eq!(product["imageUrl"], images[0]["url"]);

    let url = images[0]["url"].as_str().expect("Image url missing");
    let response = app
        .client
        .get(app.url(url))
        .send()
        .await
        .expect("Failed to fetch image");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        "image/png"
    );
}

#[tokio::test]
async fn test_create_product_requires_merchant() {
    let app = spawn_app().await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;

    let response = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&buyer)
        .multipart(product_form("Cafe", 60.0, 10))
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .post(app.url("/products"))
        .multipart(product_form("Cafe", 60.0, 10))
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_product_rejects_bad_uploads() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;

    let text_file = Part::bytes(b"hello".to_vec())
        .file_name("notes.txt")
        .mime_str("text/plain")
        .expect("Invalid mime type");
    let form = Form::new()
        .text("name", "Cafe")
        .text("precioGeneral", "60")
        .text("stock", "1")
        .part("imagenes", text_file);
    let response = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&merchant)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut form = Form::new()
        .text("name", "Cafe")
        .text("precioGeneral", "60")
        .text("stock", "1");
    for index in 0..6 {
        form = form.part("imagenes", png_part(&format!("{index}.png")));
    }
    let response = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&merchant)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let form = Form::new()
        .text("name", "Cafe")
        .text("precioGeneral", "cheap")
        .text("stock", "1");
    let response = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&merchant)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, products) = app.get_json("/products", None).await;
    assert_eq!(products.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_create_product_rejects_non_finite_prices() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;

    for price in ["inf", "-inf", "NaN"] {
        let form = Form::new()
            .text("name", "Cafe")
            .text("precioGeneral", price)
            .text("stock", "1");
        let response = app
            .client
            .post(app.url("/products"))
            .bearer_auth(&merchant)
            .multipart(form)
            .send()
            .await
            .expect("Failed to send create request");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "price {price}");
        let body: Value = response.json().await.expect("Invalid error JSON");
        assert!(body["error"].is_string());
    }

    let form = Form::new()
        .text("name", "Cafe")
        .text("precioGeneral", "60")
        .text("stock", "1")
        .text("preciosPorProvincia", r#"[{"provincia":"Matanzas","precio":-3}]"#);
    let response = app
        .client
        .post(app.url("/products"))
        .bearer_auth(&merchant)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, products) = app.get_json("/products", None).await;
    assert_eq!(products.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_name_filter_matches_wildcards_literally() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    app.create_product(&merchant, "Cafe", 60.0, 10).await;
    app.create_product(&merchant, "Miel", 20.0, 10).await;
    app.create_product(&merchant, "Pan_Integral", 5.0, 10).await;

    let (status, percent) = app.get_json("/products?name=%25", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(percent.as_array().map(Vec::len), Some(0));

    let (_, underscore) = app.get_json("/products?name=_", None).await;
    let underscore = underscore.as_array().expect("Expected an array");
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0]["name"], "Pan_Integral");
}

#[tokio::test]
async fn test_list_products_with_filters() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    app.create_product(&merchant, "Cafe Serrano", 60.0, 10).await;
    app.create_product(&merchant, "Cafe Cubita", 30.0, 10).await;
    app.create_product(&merchant, "Miel", 20.0, 10).await;

    let (status, all) = app.get_json("/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(3));

    let (_, coffee) = app.get_json("/products?name=cafe", None).await;
    assert_eq!(coffee.as_array().map(Vec::len), Some(2));

    let (_, cheap_coffee) = app.get_json("/products?name=CAFE&maxPrice=40", None).await;
    let cheap_coffee = cheap_coffee.as_array().expect("Expected an array");
    assert_eq!(cheap_coffee.len(), 1);
    assert_eq!(cheap_coffee[0]["name"], "Cafe Cubita");
}

#[tokio::test]
async fn test_get_single_and_own_products() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, other) = app.signed_in("bodega", MERCHANT_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    app.create_product(&other, "Miel", 20.0, 10).await;

    let (status, body) = app
        .get_json(&format!("/products/{}", product["id"]), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Cafe");

    let (status, _) = app.get_json("/products/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, mine) = app.get_json("/products/my-products", Some(&merchant)).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().expect("Expected an array");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["name"], "Cafe");
}

#[tokio::test]
async fn test_update_stock() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, other) = app.signed_in("bodega", MERCHANT_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    let url = app.url(&format!("/products/{}/stock", product["id"]));

    let response = app
        .client
        .patch(&url)
        .bearer_auth(&merchant)
        .json(&json!({ "stock": 42 }))
        .send()
        .await
        .expect("Failed to send stock request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Invalid product JSON");
    assert_eq!(body["stock"], 42);

    let response = app
        .client
        .patch(&url)
        .bearer_auth(&merchant)
        .json(&json!({ "stock": -1 }))
        .send()
        .await
        .expect("Failed to send stock request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .patch(&url)
        .bearer_auth(&other)
        .json(&json!({ "stock": 1 }))
        .send()
        .await
        .expect("Failed to send stock request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_product_is_owner_only_and_removes_images() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, other) = app.signed_in("bodega", MERCHANT_ROLE).await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    let product_id = product["id"].as_i64().expect("Product id missing");
    let image_url = product["imageUrl"].as_str().expect("Image missing").to_owned();
    app.set_cart_item(&buyer, product_id, 1).await;

    let response = app
        .client
        .delete(app.url(&format!("/products/{product_id}")))
        .bearer_auth(&other)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.expect("Invalid error JSON");
    assert_eq!(body["error"], "Not authorized or product does not exist");

    let response = app
        .client
        .delete(app.url(&format!("/products/{product_id}")))
        .bearer_auth(&merchant)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = app.get_json(&format!("/products/{product_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get_json(&image_url, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, summary) = app.get_json("/carrito/resumen", Some(&buyer)).await;
    assert_eq!(summary["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_add_and_delete_images() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, other) = app.signed_in("bodega", MERCHANT_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    let product_id = product["id"].as_i64().expect("Product id missing");
    let first_url = product["imageUrl"].as_str().expect("Image missing").to_owned();
    let first_id = product["imagenes"][0]["id"].as_i64().expect("Image id missing");

    let form = Form::new()
        .part("imagenes", png_part("side.png"))
        .part("imagenes", png_part("back.png"));
    let response = app
        .client
        .post(app.url(&format!("/products/{product_id}/images")))
        .bearer_auth(&merchant)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send add images request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let added: Value = response.json().await.expect("Invalid images JSON");
    assert_eq!(added.as_array().map(Vec::len), Some(2));

    let response = app
        .client
        .delete(app.url(&format!("/products/{product_id}/images/{first_id}")))
        .bearer_auth(&other)
        .send()
        .await
        .expect("Failed to send delete image request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .delete(app.url(&format!("/products/{product_id}/images/{first_id}")))
        .bearer_auth(&merchant)
        .send()
        .await
        .expect("Failed to send delete image request");
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = app.get_json(&first_url, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, detail) = app.get_json(&format!("/products/{product_id}"), None).await;
    assert_eq!(detail["imagenes"].as_array().map(Vec::len), Some(2));
    assert_eq!(detail["imageUrl"], added[0]["url"]);
}

#[tokio::test]
async fn test_uploads_only_serves_stored_names() {
    let app = spawn_app().await;

    let (status, body) = app.get_json("/uploads/secret.txt", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
