use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{order, order_item, product, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Order with its immutable line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Service for reading orders and evolving their status. Orders are never
/// deleted; cancellation is a status transition.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    restock_on_cancel: bool,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, restock_on_cancel: bool) -> Self {
        Self {
            db,
            event_sender,
            restock_on_cancel,
        }
    }

    /// Lists a user's own orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Lists all orders (admin), newest first.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Fetches one order with its items, enforcing ownership.
    #[instrument(skip(self))]
    pub async fn get_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order.find_related(order_item::Entity).all(&*self.db).await?;
        Ok(OrderDetails { order, items })
    }

    /// Moves an order through the fulfillment state machine (admin). Any
    /// transition the machine does not allow is rejected.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatusTransition {
                from: old_status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        let mut update: order::ActiveModel = order.into();
        update.status = Set(new_status);
        update.updated_at = Set(Utc::now());
        let order = update.update(&*self.db).await?;

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.as_str().to_string(),
                new_status: new_status.as_str().to_string(),
            })
            .await;

        Ok(order)
    }

    /// Cancels the caller's own order. Only pending and confirmed orders
    /// can be cancelled. When the restock policy is enabled the reserved
    /// stock is returned inside the same transaction.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: Uuid, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !order.status.is_cancellable() {
            return Err(ServiceError::InvalidStatusTransition {
                from: order.status.as_str().to_string(),
                to: OrderStatus::Cancelled.as_str().to_string(),
            });
        }

        let mut restocked = Vec::new();
        if self.restock_on_cancel {
            let items = order.find_related(order_item::Entity).all(&txn).await?;
            for item in &items {
                product::Entity::update_many()
                    .col_expr(
                        product::Column::Stock,
                        Expr::col(product::Column::Stock).add(item.quantity),
                    )
                    .filter(product::Column::Id.eq(item.product_id))
                    .exec(&txn)
                    .await?;
                restocked.push((item.product_id, item.quantity));
            }
        }

        let mut update: order::ActiveModel = order.into();
        update.status = Set(OrderStatus::Cancelled);
        update.updated_at = Set(Utc::now());
        let order = update.update(&txn).await?;

        txn.commit().await?;

        self.event_sender.send(Event::OrderCancelled(order_id)).await;
        for (product_id, quantity) in restocked {
            self.event_sender
                .send(Event::StockRestocked {
                    product_id,
                    quantity,
                })
                .await;
        }

        info!(%order_id, restock = self.restock_on_cancel, "order cancelled");
        Ok(order)
    }
}
