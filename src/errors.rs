use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Central error type for the service layer.
///
/// Every handler returns this; `status_code()` is the single source of truth
/// for error-to-status mapping and `response_message()` decides what is safe
/// to show callers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("No payment gateway registered for provider {0}")]
    UnknownProvider(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::UnsupportedPaymentMethod(_)
            | Self::EmptyCart
            | Self::InsufficientStock(_)
            | Self::InvalidStatusTransition { .. }
            | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            // A missing adapter mapping is a deployment fault, not a caller error.
            Self::UnknownProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownTransaction(_) => StatusCode::NOT_FOUND,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::UnknownProvider(_) => "Payment provider misconfigured".to_string(),
            Self::GatewayError(_) => "Payment provider request failed".to_string(),
            _ => self.to_string(),
        }
    }

    /// Stable machine-readable code per error category.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::UnsupportedPaymentMethod(_) => "unsupported_payment_method",
            Self::EmptyCart => "empty_cart",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::GatewayError(_) => "gateway_error",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::InvalidStatusTransition { .. } => "invalid_status_transition",
            Self::UnknownTransaction(_) => "unknown_transaction",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }
}

/// Error body returned to HTTP callers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.response_message();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }

        let body = json!(ErrorResponse {
            error: self.error_code().to_string(),
            message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_failures_map_to_bad_request() {
        for err in [
            ServiceError::EmptyCart,
            ServiceError::UnsupportedPaymentMethod("bogus".into()),
            ServiceError::InsufficientStock("widget".into()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ServiceError::InternalError("connection string was postgres://user:pw".into());
        assert_eq!(err.response_message(), "Internal server error");

        let err = ServiceError::GatewayError("tls handshake with api.stripe.com failed".into());
        assert_eq!(err.response_message(), "Payment provider request failed");
    }

    #[test]
    fn gateway_failures_are_distinguishable_from_caller_errors() {
        assert_eq!(
            ServiceError::GatewayError("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::UnknownProvider("applepay".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
