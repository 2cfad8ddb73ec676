//! Payment gateway adapters.
//!
//! The checkout orchestrator never talks to a provider API directly; it
//! resolves a [`PaymentGateway`] through the [`GatewayRegistry`] using the
//! payment method's provider tag and calls `create_charge`. Asynchronous
//! outcome delivery happens out-of-band through the webhook handler.

mod cod;
mod stripe;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{PaymentProvider, TransactionStatus};
use crate::errors::ServiceError;

pub use cod::CodGateway;
pub use stripe::StripeGateway;

/// Everything a gateway needs to open a charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    /// Amount in minor units (cents for usd).
    pub amount_minor: i64,
    /// ISO currency code, lowercase.
    pub currency: String,
}

/// Result of opening a charge with a provider.
#[derive(Debug, Clone)]
pub struct Charge {
    /// Provider-side transaction id (payment intent id, synthetic COD id).
    pub provider_transaction_id: String,
    pub status: TransactionStatus,
    /// Payload the client needs to complete payment (e.g. a client secret).
    pub client_payload: Value,
    /// Raw provider response, persisted on the transaction for audit.
    pub raw_response: Option<Value>,
}

/// Adapter over one payment provider's charge and status operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Opens a charge. For asynchronous providers this creates a
    /// provider-side intent; for cash on delivery it synthesizes a
    /// transaction id without any external call.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, ServiceError>;

    /// Pull-model status check for an existing charge, used when a
    /// notification arrives without an explicit outcome.
    async fn confirm(&self, provider_transaction_id: &str)
        -> Result<TransactionStatus, ServiceError>;

    /// Returns money to the payer. Providers that settle out-of-band may
    /// treat this as record-keeping only.
    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount_minor: i64,
    ) -> Result<TransactionStatus, ServiceError>;
}

/// Maps provider tags to adapter instances. Built once at startup; a method
/// whose tag has no mapping is a deployment configuration fault.
#[derive(Clone)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentProvider, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self {
            gateways: HashMap::new(),
        }
    }

    pub fn register(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn get(&self, provider: PaymentProvider) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        self.gateways
            .get(&provider)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownProvider(provider.to_string()))
    }

    /// Builds the registry from configuration. Cash on delivery is always
    /// available; the card processor is registered only when a secret key is
    /// configured.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut registry = Self::new().register(Arc::new(CodGateway::new()));
        if let Some(secret) = &cfg.stripe_secret_key {
            registry = registry.register(Arc::new(StripeGateway::new(
                secret.clone(),
                cfg.stripe_api_base.clone(),
            )));
        }
        registry
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("providers", &self.gateways.keys().collect::<Vec<_>>())
            .finish()
    }
}
