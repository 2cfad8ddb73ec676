use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::entities::PaymentProvider;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::AppState;

pub fn payment_method_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payment_methods).post(create_payment_method))
        .route("/:id/active", put(set_payment_method_active))
}

/// Lists methods a client may choose from. Activation is re-checked at
/// checkout time regardless of what this returned earlier.
async fn list_payment_methods(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let methods = state.services.payment_methods.list_active().await?;
    Ok(success_response(methods))
}

#[derive(Debug, Deserialize, Validate)]
struct CreatePaymentMethodRequest {
    #[validate(length(min = 1))]
    name: String,
    description: Option<String>,
    provider: PaymentProvider,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_true() -> bool {
    true
}

async fn create_payment_method(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentMethodRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;
    validate_input(&payload)?;

    let method = state
        .services
        .payment_methods
        .create(
            &payload.name,
            payload.description,
            payload.provider,
            payload.is_active,
        )
        .await?;
    Ok(created_response(method))
}

#[derive(Debug, Deserialize)]
struct SetActiveRequest {
    is_active: bool,
}

async fn set_payment_method_active(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;

    let method = state
        .services
        .payment_methods
        .set_active(id, payload.is_active)
        .await?;
    Ok(success_response(method))
}
