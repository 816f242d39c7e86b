mod common;

use common::{spawn_app, MERCHANT_ROLE, USER_ROLE};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_set_item_quantity_is_absolute() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    let product_id = product["id"].as_i64().expect("Product id missing");

    let response = app.set_cart_item(&buyer, product_id, 2).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Invalid cart JSON");
    assert_eq!(body["cantidad"], 2);

    let response = app.set_cart_item(&buyer, product_id, 5).await;
    let body: Value = response.json().await.expect("Invalid cart JSON");
    assert_eq!(body["cantidad"], 5);

    let (_, summary) = app.get_json("/carrito/resumen", Some(&buyer)).await;
    assert_eq!(summary["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(summary["items"][0]["cantidad"], 5);
}

#[tokio::test]
async fn test_zero_quantity_removes_line() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    let product_id = product["id"].as_i64().expect("Product id missing");

    let response = app.set_cart_item(&buyer, product_id, 0).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Invalid cart JSON");
    assert_eq!(body["message"], "No item to remove");

    app.set_cart_item(&buyer, product_id, 3).await;
    let response = app.set_cart_item(&buyer, product_id, 0).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (status, summary) = app.get_json("/carrito/resumen", Some(&buyer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(summary["subtotal"], 0.0);
    assert_eq!(summary["envio"], 10.0);
}

#[tokio::test]
async fn test_rejects_negative_and_unknown_products() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    let product_id = product["id"].as_i64().expect("Product id missing");

    let response = app.set_cart_item(&buyer, product_id, -1).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.set_cart_item(&buyer, 999, 1).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("Invalid error JSON");
    assert_eq!(body["error"], "Product with id 999 not found");
}

#[tokio::test]
async fn test_summary_without_cart() {
    let app = spawn_app().await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;

    let (status, body) = app.get_json("/carrito/resumen", Some(&buyer)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cart not found");
}

#[tokio::test]
async fn test_summary_totals_and_free_shipping() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;
    let coffee = app.create_product(&merchant, "Cafe", 60.0, 10).await;
    let honey = app.create_product(&merchant, "Miel", 25.0, 10).await;

    app.set_cart_item(&buyer, coffee["id"].as_i64().expect("id"), 1).await;
    app.set_cart_item(&buyer, honey["id"].as_i64().expect("id"), 2).await;

    let (status, summary) = app.get_json("/carrito/resumen", Some(&buyer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["subtotal"], 110.0);
    assert_eq!(summary["envio"], 0.0);
    assert_eq!(summary["total"], 110.0);
    assert_eq!(summary["metodoPago"], "TARJETA");

    let honey_line = summary["items"]
        .as_array()
        .and_then(|items| items.iter().find(|item| item["nombre"] == "Miel"))
        .expect("Honey line missing");
    assert_eq!(honey_line["precioUnitario"], 25.0);
    assert_eq!(honey_line["total"], 50.0);
    assert!(honey_line["imagen"]
        .as_str()
        .is_some_and(|url| url.starts_with("/uploads/")));
}

#[tokio::test]
async fn test_summary_charges_shipping_up_to_threshold() {
    let app = spawn_app().await;
    let (_, merchant) = app.signed_in("tienda", MERCHANT_ROLE).await;
    let (_, buyer) = app.signed_in("ana", USER_ROLE).await;
    let product = app.create_product(&merchant, "Cafe", 50.0, 10).await;

    app.set_cart_item(&buyer, product["id"].as_i64().expect("id"), 2).await;

    let (_, summary) = app.get_json("/carrito/resumen", Some(&buyer)).await;
    assert_eq!(summary["subtotal"], 100.0);
    assert_eq!(summary["envio"], 10.0);
    assert_eq!(summary["total"], 110.0);
}
