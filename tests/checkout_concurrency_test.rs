//! Oversell guard under contention: more buyers than stock, and exactly
//! stock-many checkouts may succeed.

mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use storefront_api::entities::PaymentProvider;
use storefront_api::services::checkout::CheckoutRequest;

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let app = Arc::new(TestApp::new().await);
    app.seed_payment_method("cash on delivery", PaymentProvider::CashOnDelivery)
        .await;
    let product = app.seed_product("limited-run", dec!(99.00), 10).await;

    // 20 distinct buyers, one unit each, racing over 10 units of stock.
    let mut carts = Vec::new();
    for _ in 0..20 {
        let user_id = Uuid::new_v4();
        app.services
            .carts
            .add_item(user_id, product.id, 1)
            .await
            .unwrap();
        carts.push(user_id);
    }

    let mut tasks = Vec::new();
    for user_id in carts {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            app.services
                .checkout
                .checkout(
                    user_id,
                    CheckoutRequest {
                        shipping_address: "1 Main St".to_string(),
                        payment_method: "cash on delivery".to_string(),
                    },
                )
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(
        successes, 10,
        "exactly 10 checkouts should succeed; got {}",
        successes
    );
    assert_eq!(app.product_stock(product.id).await, 0);
}
