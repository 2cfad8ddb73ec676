use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::entities::{PaymentProvider, TransactionStatus};
use crate::errors::ServiceError;

use super::{Charge, ChargeRequest, PaymentGateway};

/// Cash-on-delivery gateway. No external provider exists; `create_charge`
/// synthesizes a transaction id and the charge stays pending until
/// fulfillment confirms payment out-of-band.
#[derive(Debug, Default, Clone)]
pub struct CodGateway;

impl CodGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for CodGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::CashOnDelivery
    }

    async fn create_charge(&self, _request: &ChargeRequest) -> Result<Charge, ServiceError> {
        Ok(Charge {
            provider_transaction_id: format!("cod_{}", Uuid::new_v4().simple()),
            status: TransactionStatus::Pending,
            client_payload: json!({}),
            raw_response: None,
        })
    }

    async fn confirm(
        &self,
        _provider_transaction_id: &str,
    ) -> Result<TransactionStatus, ServiceError> {
        // Payment is collected at the door; only a fulfillment event can
        // settle it, so a status pull always reports pending.
        Ok(TransactionStatus::Pending)
    }

    async fn refund(
        &self,
        _provider_transaction_id: &str,
        _amount_minor: i64,
    ) -> Result<TransactionStatus, ServiceError> {
        // Cash is returned out-of-band; the refund is ledger-only.
        Ok(TransactionStatus::Refunded)
    }
}
