use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use crate::entities::{PaymentProvider, TransactionStatus};
use crate::errors::ServiceError;

use super::{Charge, ChargeRequest, PaymentGateway};

/// Card-processor gateway backed by the Stripe payment-intents API.
///
/// `create_charge` opens an intent and hands the client secret back to the
/// caller; settlement arrives later through the webhook handler, never
/// synchronously.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            api_base,
        }
    }

    fn map_intent_status(status: &str) -> TransactionStatus {
        match status {
            "succeeded" => TransactionStatus::Success,
            "canceled" => TransactionStatus::Failed,
            _ => TransactionStatus::Pending,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    #[instrument(skip(self), fields(order_id = %request.order_id))]
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, ServiceError> {
        let params = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.clone()),
            ("metadata[order_id]", request.order_id.to_string()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("payment intent request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::GatewayError(format!(
                "payment intent rejected ({}): {}",
                status, body
            )));
        }

        let intent: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("payment intent decode: {}", e)))?;

        let intent_id = intent
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::GatewayError("payment intent without id".into()))?
            .to_string();
        let client_secret = intent
            .get("client_secret")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Charge {
            provider_transaction_id: intent_id,
            status: TransactionStatus::Pending,
            client_payload: json!({ "client_secret": client_secret }),
            raw_response: Some(intent),
        })
    }

    #[instrument(skip(self))]
    async fn confirm(
        &self,
        provider_transaction_id: &str,
    ) -> Result<TransactionStatus, ServiceError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/payment_intents/{}",
                self.api_base, provider_transaction_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("payment intent lookup: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::GatewayError(format!(
                "payment intent lookup rejected ({})",
                response.status()
            )));
        }

        let intent: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("payment intent decode: {}", e)))?;

        let status = intent
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("processing");
        Ok(Self::map_intent_status(status))
    }

    #[instrument(skip(self))]
    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount_minor: i64,
    ) -> Result<TransactionStatus, ServiceError> {
        let params = [
            ("payment_intent", provider_transaction_id.to_string()),
            ("amount", amount_minor.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/refunds", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("refund request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::GatewayError(format!(
                "refund rejected ({}): {}",
                status, body
            )));
        }

        Ok(TransactionStatus::Refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_status_mapping() {
        assert_eq!(
            StripeGateway::map_intent_status("succeeded"),
            TransactionStatus::Success
        );
        assert_eq!(
            StripeGateway::map_intent_status("canceled"),
            TransactionStatus::Failed
        );
        assert_eq!(
            StripeGateway::map_intent_status("requires_payment_method"),
            TransactionStatus::Pending
        );
        assert_eq!(
            StripeGateway::map_intent_status("processing"),
            TransactionStatus::Pending
        );
    }
}
