use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, ModelTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{cart, cart_item, product};
use crate::errors::ServiceError;

/// Cart with its line items, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

/// Service for the per-user mutable cart. The cart is the source of truth
/// until checkout commits; `total_price` is recomputed on every mutation.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Returns the user's cart, or an empty view if none exists yet. Carts
    /// are created lazily on first add, not here.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<Option<CartView>, ServiceError> {
        let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let items = cart.find_related(cart_item::Entity).all(&*self.db).await?;
        Ok(Some(CartView { cart, items }))
    }

    /// Adds a product to the cart, capturing the unit price at add time.
    /// Adding a product already in the cart merges quantities.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let txn = self.db.begin().await?;
        let now = Utc::now();

        let cart = match cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            Some(cart) => cart,
            None => {
                cart::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    total_price: Set(Decimal::ZERO),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        match existing {
            Some(line) => {
                let merged = line.quantity.checked_add(quantity).ok_or_else(|| {
                    ServiceError::ValidationError("quantity too large".to_string())
                })?;
                let mut update: cart_item::ActiveModel = line.into();
                update.quantity = Set(merged);
                update.updated_at = Set(now);
                update.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    unit_price: Set(product.price),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }

        let cart = Self::recompute_total(&txn, cart).await?;
        let items = cart.find_related(cart_item::Entity).all(&txn).await?;
        txn.commit().await?;

        Ok(CartView { cart, items })
    }

    /// Sets the quantity of an existing line; zero removes it.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }
        if quantity == 0 {
            return self.remove_item(user_id, product_id).await;
        }

        let txn = self.db.begin().await?;
        let cart = Self::find_cart(&txn, user_id).await?;

        let line = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not in cart", product_id)))?;

        let mut update: cart_item::ActiveModel = line.into();
        update.quantity = Set(quantity);
        update.updated_at = Set(Utc::now());
        update.update(&txn).await?;

        let cart = Self::recompute_total(&txn, cart).await?;
        let items = cart.find_related(cart_item::Entity).all(&txn).await?;
        txn.commit().await?;

        Ok(CartView { cart, items })
    }

    /// Removes a line from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = Self::find_cart(&txn, user_id).await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        let cart = Self::recompute_total(&txn, cart).await?;
        let items = cart.find_related(cart_item::Entity).all(&txn).await?;
        txn.commit().await?;

        Ok(CartView { cart, items })
    }

    /// Deletes the cart and all its lines.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        if let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
            cart::Entity::delete_by_id(cart.id).exec(&txn).await?;
        }
        txn.commit().await?;
        Ok(())
    }

    async fn find_cart(
        txn: &DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))
    }

    async fn recompute_total(
        txn: &DatabaseTransaction,
        cart: cart::Model,
    ) -> Result<cart::Model, ServiceError> {
        let items = cart.find_related(cart_item::Entity).all(txn).await?;
        let total: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();

        let mut update: cart::ActiveModel = cart.into();
        update.total_price = Set(total);
        update.updated_at = Set(Utc::now());
        Ok(update.update(txn).await?)
    }
}
