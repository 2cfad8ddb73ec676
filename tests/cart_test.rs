//! Integration tests for cart mutations and total maintenance.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::errors::ServiceError;

#[tokio::test]
async fn adding_the_same_product_merges_quantities_and_recomputes_total() {
    let app = TestApp::new().await;
    let widget = app.seed_product("widget", dec!(2.50), 100).await;
    let user_id = Uuid::new_v4();

    app.services.carts.add_item(user_id, widget.id, 2).await.unwrap();
    let view = app.services.carts.add_item(user_id, widget.id, 3).await.unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 5);
    assert_eq!(view.cart.total_price, dec!(12.50));
}

#[tokio::test]
async fn merge_rejects_quantities_that_overflow() {
    let app = TestApp::new().await;
    let widget = app.seed_product("widget", dec!(1.00), 100).await;
    let user_id = Uuid::new_v4();

    app.services
        .carts
        .add_item(user_id, widget.id, i32::MAX - 1)
        .await
        .unwrap();

    let err = app
        .services
        .carts
        .add_item(user_id, widget.id, 2)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // The line is unchanged.
    let view = app.services.carts.get_cart(user_id).await.unwrap().unwrap();
    assert_eq!(view.items[0].quantity, i32::MAX - 1);
}

#[tokio::test]
async fn setting_quantity_to_zero_removes_the_line() {
    let app = TestApp::new().await;
    let widget = app.seed_product("widget", dec!(3.00), 10).await;
    let gizmo = app.seed_product("gizmo", dec!(1.00), 10).await;
    let user_id = Uuid::new_v4();

    app.services.carts.add_item(user_id, widget.id, 2).await.unwrap();
    app.services.carts.add_item(user_id, gizmo.id, 1).await.unwrap();

    let view = app
        .services
        .carts
        .update_item_quantity(user_id, widget.id, 0)
        .await
        .unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.cart.total_price, dec!(1.00));
}
