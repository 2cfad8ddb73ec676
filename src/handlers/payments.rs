use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::services::payments::PaymentOutcome;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(payment_webhook))
        .route("/refunds", post(refund_payment))
}

#[derive(Debug, Deserialize)]
struct RefundRequest {
    provider_transaction_id: String,
}

/// Issues a refund for a settled transaction (admin).
async fn refund_payment(
    State(state): State<AppState>,
    user: AuthUser,
    axum::Json(payload): axum::Json<RefundRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;

    let applied = state
        .services
        .payment_confirmation
        .refund(&payload.provider_transaction_id)
        .await?;
    Ok(success_response(applied))
}

/// Provider-originated confirmation payload. `outcome` may be absent, in
/// which case the current status is pulled from the provider.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    provider_transaction_id: String,
    outcome: Option<PaymentOutcome>,
}

/// Inbound payment notification. The caller is the provider, not a user
/// session, so authenticity rests on the HMAC signature when a webhook
/// secret is configured.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = &state.config.payment_webhook_secret {
        let tolerance = state.config.payment_webhook_tolerance_secs;
        if !verify_signature(&headers, &body, secret, tolerance) {
            warn!("payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook body: {}", e)))?;

    let result = match payload.outcome {
        Some(outcome) => {
            state
                .services
                .payment_confirmation
                .confirm(&payload.provider_transaction_id, outcome)
                .await
        }
        None => {
            state
                .services
                .payment_confirmation
                .reconcile(&payload.provider_transaction_id)
                .await
        }
    };

    match result {
        Ok(applied) => {
            info!(
                order_id = %applied.order_id,
                changed = applied.changed,
                "webhook processed"
            );
            Ok((StatusCode::OK, "ok"))
        }
        // A stale or duplicate notification for a transaction we do not
        // know is logged and discarded; retrying it would never succeed.
        Err(ServiceError::UnknownTransaction(id)) => {
            warn!(provider_transaction_id = %id, "webhook for unknown transaction discarded");
            Ok((StatusCode::OK, "ok"))
        }
        Err(e) => Err(e),
    }
}

/// Verifies either the generic `x-timestamp`/`x-signature` HMAC scheme or a
/// Stripe-style `Stripe-Signature: t=…,v1=…` header. The signed message is
/// `"{timestamp}.{body}"`.
fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            if !timestamp_within_tolerance(ts, tolerance_secs) {
                return false;
            }
            return signature_matches(ts, payload, secret, sig);
        }
    }

    if let Some(header) = headers.get("Stripe-Signature").and_then(|h| h.to_str().ok()) {
        let mut ts = "";
        let mut v1 = "";
        for part in header.split(',') {
            match part.split_once('=') {
                Some(("t", val)) => ts = val,
                Some(("v1", val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            if !timestamp_within_tolerance(ts, tolerance_secs) {
                return false;
            }
            return signature_matches(ts, payload, secret, v1);
        }
    }

    false
}

fn timestamp_within_tolerance(ts: &str, tolerance_secs: u64) -> bool {
    match ts.parse::<i64>() {
        Ok(ts) => {
            let now = chrono::Utc::now().timestamp();
            (now - ts).unsigned_abs() <= tolerance_secs
        }
        Err(_) => false,
    }
}

fn signature_matches(ts: &str, payload: &Bytes, secret: &str, provided: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, provided)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
