use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::AppState;

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wishlist).post(add_to_wishlist))
        .route("/:product_id", delete(remove_from_wishlist))
}

async fn get_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.wishlists.list(user.user_id).await?;
    Ok(success_response(products))
}

#[derive(Debug, Deserialize)]
struct AddToWishlistRequest {
    product_id: Uuid,
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToWishlistRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state
        .services
        .wishlists
        .add(user.user_id, payload.product_id)
        .await?;
    Ok(success_response(products))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state
        .services
        .wishlists
        .remove(user.user_id, product_id)
        .await?;
    Ok(success_response(products))
}
