//! Integration tests for asynchronous payment confirmation: outcome
//! application, idempotent replays, and reconciliation.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use storefront_api::entities::{
    order, payment_transaction, PaymentProvider, PaymentStatus, TransactionStatus,
};
use storefront_api::errors::ServiceError;
use storefront_api::services::checkout::CheckoutRequest;
use storefront_api::services::payments::PaymentOutcome;

async fn place_order(app: &TestApp, method: &str) -> (Uuid, String) {
    let widget = app.seed_product("widget", dec!(30.00), 10).await;
    let user_id = Uuid::new_v4();
    app.services
        .carts
        .add_item(user_id, widget.id, 1)
        .await
        .unwrap();
    let outcome = app
        .services
        .checkout
        .checkout(
            user_id,
            CheckoutRequest {
                shipping_address: "1 Main St".to_string(),
                payment_method: method.to_string(),
            },
        )
        .await
        .unwrap();

    let transaction = payment_transaction::Entity::find()
        .filter(payment_transaction::Column::OrderId.eq(outcome.order.id))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    (outcome.order.id, transaction.provider_transaction_id)
}

async fn order_payment_status(app: &TestApp, order_id: Uuid) -> PaymentStatus {
    order::Entity::find_by_id(order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .payment_status
}

#[tokio::test]
async fn successful_confirmation_marks_order_paid() {
    let app = TestApp::new().await;
    app.seed_payment_method("card", PaymentProvider::Stripe).await;
    let (order_id, provider_tx_id) = place_order(&app, "card").await;

    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Pending);

    let applied = app
        .services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Succeeded)
        .await
        .unwrap();
    assert!(applied.changed);
    assert_eq!(applied.order_id, order_id);

    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Paid);
    let transaction = payment_transaction::Entity::find_by_id(applied.transaction_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Success);
}

#[tokio::test]
async fn replayed_confirmation_is_a_no_op() {
    let app = TestApp::new().await;
    app.seed_payment_method("card", PaymentProvider::Stripe).await;
    let (order_id, provider_tx_id) = place_order(&app, "card").await;

    let first = app
        .services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Succeeded)
        .await
        .unwrap();
    assert!(first.changed);

    // The provider retries the notification; nothing moves.
    let replay = app
        .services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Succeeded)
        .await
        .unwrap();
    assert!(!replay.changed);
    assert_eq!(replay.order_id, order_id);
    assert_eq!(replay.transaction_id, first.transaction_id);
    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Paid);
}

#[tokio::test]
async fn contradictory_outcome_after_settlement_is_discarded() {
    let app = TestApp::new().await;
    app.seed_payment_method("card", PaymentProvider::Stripe).await;
    let (order_id, provider_tx_id) = place_order(&app, "card").await;

    let first = app
        .services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Succeeded)
        .await
        .unwrap();
    assert!(first.changed);

    // A late failure notification for a settled transaction must not
    // rewrite the ledger or contradict the order.
    let late = app
        .services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Failed)
        .await
        .unwrap();
    assert!(!late.changed);

    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Paid);
    let transaction = payment_transaction::Entity::find_by_id(first.transaction_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Success);
}

#[tokio::test]
async fn concurrent_deliveries_settle_exactly_once() {
    let app = std::sync::Arc::new(TestApp::new().await);
    app.seed_payment_method("card", PaymentProvider::Stripe).await;
    let (order_id, provider_tx_id) = place_order(&app, "card").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let id = provider_tx_id.clone();
        tasks.push(tokio::spawn(async move {
            app.services
                .payment_confirmation
                .confirm(&id, PaymentOutcome::Succeeded)
                .await
                .unwrap()
                .changed
        }));
    }

    let mut applied = 0;
    for task in tasks {
        if task.await.unwrap() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1, "only one delivery may settle the transaction");
    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Paid);
}

#[tokio::test]
async fn failed_confirmation_marks_order_failed() {
    let app = TestApp::new().await;
    app.seed_payment_method("card", PaymentProvider::Stripe).await;
    let (order_id, provider_tx_id) = place_order(&app, "card").await;

    let applied = app
        .services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Failed)
        .await
        .unwrap();
    assert!(applied.changed);

    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Failed);
    let transaction = payment_transaction::Entity::find_by_id(applied.transaction_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn unknown_transaction_is_reported() {
    let app = TestApp::new().await;
    let err = app
        .services
        .payment_confirmation
        .confirm("pi_does_not_exist", PaymentOutcome::Succeeded)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::UnknownTransaction(id) if id == "pi_does_not_exist");
}

#[tokio::test]
async fn refund_requires_a_settled_transaction_and_is_idempotent() {
    let app = TestApp::new().await;
    app.seed_payment_method("card", PaymentProvider::Stripe).await;
    let (order_id, provider_tx_id) = place_order(&app, "card").await;

    // Still pending: nothing to return yet.
    let err = app
        .services
        .payment_confirmation
        .refund(&provider_tx_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    app.services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Succeeded)
        .await
        .unwrap();

    let applied = app
        .services
        .payment_confirmation
        .refund(&provider_tx_id)
        .await
        .unwrap();
    assert!(applied.changed);
    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Refunded);

    let transaction = payment_transaction::Entity::find_by_id(applied.transaction_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Refunded);
    assert!(transaction.is_refunded);
    assert_eq!(transaction.refund_amount, transaction.amount);

    // Replays change nothing.
    let replay = app
        .services
        .payment_confirmation
        .refund(&provider_tx_id)
        .await
        .unwrap();
    assert!(!replay.changed);
}

#[tokio::test]
async fn refund_gateway_failure_leaves_the_ledger_untouched() {
    let app = TestApp::new().await;
    app.seed_payment_method("card", PaymentProvider::Stripe).await;
    let (order_id, provider_tx_id) = place_order(&app, "card").await;
    app.services
        .payment_confirmation
        .confirm(&provider_tx_id, PaymentOutcome::Succeeded)
        .await
        .unwrap();

    app.fail_card_charges
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let err = app
        .services
        .payment_confirmation
        .refund(&provider_tx_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(_));

    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Paid);
    let transaction = payment_transaction::Entity::find()
        .filter(payment_transaction::Column::ProviderTransactionId.eq(provider_tx_id.as_str()))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Success);
    assert!(!transaction.is_refunded);
}

#[tokio::test]
async fn reconcile_with_pending_provider_status_changes_nothing() {
    let app = TestApp::new().await;
    app.seed_payment_method("cash on delivery", PaymentProvider::CashOnDelivery)
        .await;
    let (order_id, provider_tx_id) = place_order(&app, "cash on delivery").await;

    // The COD adapter reports pending until fulfillment settles the order.
    let applied = app
        .services
        .payment_confirmation
        .reconcile(&provider_tx_id)
        .await
        .unwrap();
    assert!(!applied.changed);
    assert_eq!(order_payment_status(&app, order_id).await, PaymentStatus::Pending);
}
