#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, EntityTrait, Set};
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::config::AppConfig;
use storefront_api::db::{self, DbPool};
use storefront_api::entities::{payment_method, product, PaymentProvider, TransactionStatus};
use storefront_api::errors::ServiceError;
use storefront_api::events::{process_events, EventSender};
use storefront_api::gateway::{
    Charge, ChargeRequest, CodGateway, GatewayRegistry, PaymentGateway,
};
use storefront_api::handlers::AppServices;

/// Stub card processor used in place of the real one. Charges succeed with a
/// pending intent unless the failure switch is flipped.
pub struct StubCardGateway {
    fail_charges: Arc<AtomicBool>,
}

impl StubCardGateway {
    pub fn new(fail_charges: Arc<AtomicBool>) -> Self {
        Self { fail_charges }
    }
}

#[async_trait]
impl PaymentGateway for StubCardGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, ServiceError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError(
                "card processor unavailable".to_string(),
            ));
        }
        Ok(Charge {
            provider_transaction_id: format!("card_{}", Uuid::new_v4().simple()),
            status: TransactionStatus::Pending,
            client_payload: json!({
                "client_secret": format!("secret_{}", request.order_id.simple()),
            }),
            raw_response: None,
        })
    }

    async fn confirm(
        &self,
        _provider_transaction_id: &str,
    ) -> Result<TransactionStatus, ServiceError> {
        Ok(TransactionStatus::Pending)
    }

    async fn refund(
        &self,
        _provider_transaction_id: &str,
        _amount_minor: i64,
    ) -> Result<TransactionStatus, ServiceError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError(
                "card processor unavailable".to_string(),
            ));
        }
        Ok(TransactionStatus::Refunded)
    }
}

/// In-memory test application: SQLite DB with the full schema, the service
/// layer wired the same way the binary wires it, and a stub card gateway.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub fail_card_charges: Arc<AtomicBool>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(false).await
    }

    pub async fn with_restock_on_cancel() -> Self {
        Self::build(true).await
    }

    async fn build(restock_on_cancel: bool) -> Self {
        // A single pooled connection keeps every handle on the same
        // in-memory database.
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(5))
            .sqlx_logging(false);
        let pool = Database::connect(opt).await.expect("sqlite connect");
        db::run_migrations(&pool).await.expect("migrations");
        let db = Arc::new(pool);

        let (tx, rx) = mpsc::channel(100);
        let event_sender = EventSender::new(tx);
        tokio::spawn(process_events(rx));

        let fail_card_charges = Arc::new(AtomicBool::new(false));
        let gateways = GatewayRegistry::new()
            .register(Arc::new(CodGateway::new()))
            .register(Arc::new(StubCardGateway::new(fail_card_charges.clone())));

        let mut cfg = AppConfig::new(
            "sqlite::memory:",
            "test_secret_key_for_testing_purposes_only_32chars",
        );
        cfg.restock_on_cancel = restock_on_cancel;

        let services = AppServices::new(db.clone(), event_sender, gateways, &cfg);

        Self {
            db,
            services,
            fail_card_charges,
        }
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            stock: Set(stock),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_payment_method(
        &self,
        name: &str,
        provider: PaymentProvider,
    ) -> payment_method::Model {
        self.services
            .payment_methods
            .create(name, None, provider, true)
            .await
            .expect("seed payment method")
    }

    pub async fn product_stock(&self, product_id: Uuid) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .expect("load product")
            .expect("product exists")
            .stock
    }
}
