use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content_response, success_response};
use crate::services::carts::CartView;
use crate::AppState;

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_item).delete(remove_item))
}

/// An absent cart renders as an empty one; carts exist lazily.
fn cart_or_empty(view: Option<CartView>, user_id: Uuid) -> serde_json::Value {
    match view {
        Some(view) => serde_json::json!({
            "cart": view.cart,
            "items": view.items,
        }),
        None => serde_json::json!({
            "cart": {
                "user_id": user_id,
                "total_price": Decimal::ZERO,
            },
            "items": [],
        }),
    }
}

async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state.services.carts.get_cart(user.user_id).await?;
    Ok(success_response(cart_or_empty(view, user.user_id)))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    product_id: Uuid,
    quantity: i32,
}

async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state
        .services
        .carts
        .add_item(user.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(success_response(view))
}

#[derive(Debug, Deserialize)]
struct UpdateItemRequest {
    quantity: i32,
}

async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state
        .services
        .carts
        .update_item_quantity(user.user_id, product_id, payload.quantity)
        .await?;
    Ok(success_response(view))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state
        .services
        .carts
        .remove_item(user.user_id, product_id)
        .await?;
    Ok(success_response(view))
}

async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.carts.clear(user.user_id).await?;
    Ok(no_content_response())
}
