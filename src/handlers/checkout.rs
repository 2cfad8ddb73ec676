use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, validate_input};
use crate::services::checkout::CheckoutRequest;
use crate::AppState;

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Converts the caller's cart into an order. Returns 201 with the created
/// order and the provider payload the client needs to complete payment.
async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .checkout
        .checkout(user.user_id, payload)
        .await?;

    Ok(created_response(outcome))
}
