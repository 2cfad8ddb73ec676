use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{
    cart, cart_item, order, order_item, payment_transaction, product, OrderStatus, PaymentStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{ChargeRequest, GatewayRegistry};
use crate::services::payment_methods::PaymentMethodService;

/// Checkout request as accepted from the client. The caller identity comes
/// from the authenticated context, never from the body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "payment method is required"))]
    pub payment_method: String,
}

/// Result of a committed checkout: the created order plus whatever the
/// client needs to complete payment (e.g. a card confirmation secret).
#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub payment: Value,
}

/// The checkout orchestrator: converts the mutable cart into an immutable,
/// paid-for order as a single atomic unit.
///
/// All writes (stock decrements, order and item creation, the transaction
/// audit row, cart deletion) happen inside one database transaction. The
/// per-product conditional decrement (`stock = stock - q WHERE stock >= q`)
/// is the authoritative oversell guard; the gateway call sits between the
/// decrement and the commit so a provider failure unwinds everything.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    payment_methods: Arc<PaymentMethodService>,
    gateways: GatewayRegistry,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        payment_methods: Arc<PaymentMethodService>,
        gateways: GatewayRegistry,
        currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            payment_methods,
            gateways,
            currency,
        }
    }

    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        request.validate()?;

        // Resolve method and adapter before touching any state. A method
        // whose provider tag has no registered gateway is a deployment
        // fault and must fail before the cart or stock is read.
        let method = self
            .payment_methods
            .resolve_active(&request.payment_method)
            .await?;
        let gateway = self.gateways.get(method.provider)?;

        let txn = self.db.begin().await?;
        let now = Utc::now();

        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;
        let items = cart.find_related(cart_item::Entity).all(&txn).await?;
        if items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        // Total is pinned from the cart now; product price changes after
        // this point do not affect the order.
        let total = cart.total_price;
        let order_id = Uuid::new_v4();

        // The order shell goes in first so the item rows have a parent to
        // reference.
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            shipping_address: Set(request.shipping_address.clone()),
            payment_method_id: Set(method.id),
            total_amount: Set(total),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Initiated),
            latest_transaction_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for item in &items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            // Conditional decrement: the filter re-checks stock at commit
            // time, so a concurrent checkout that drained the product makes
            // rows_affected zero and the whole operation aborts.
            let decremented = product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(item.quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(item.product_id))
                .filter(product::Column::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;
            if decremented.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(product.name));
            }

            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        // Provider dispatch. Inventory is already conditionally reserved;
        // any gateway failure propagates out of this function before the
        // commit, so the reservation unwinds with the transaction.
        let charge = gateway
            .create_charge(&ChargeRequest {
                order_id,
                user_id,
                amount_minor: to_minor_units(total)?,
                currency: self.currency.clone(),
            })
            .await?;

        let transaction = payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            user_id: Set(user_id),
            payment_method_id: Set(method.id),
            provider: Set(method.provider),
            provider_transaction_id: Set(charge.provider_transaction_id.clone()),
            amount: Set(total),
            currency: Set(self.currency.clone()),
            status: Set(charge.status),
            is_refunded: Set(false),
            refund_amount: Set(Decimal::ZERO),
            response_data: Set(charge.raw_response.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut order_update: order::ActiveModel = order.into();
        order_update.payment_status = Set(PaymentStatus::Pending);
        order_update.latest_transaction_id = Set(Some(transaction.id));
        order_update.updated_at = Set(now);
        let order = order_update.update(&txn).await?;

        // The cart is consumed by the commit; replaying the same request
        // afterwards fails with EmptyCart instead of double-ordering.
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        cart::Entity::delete_by_id(cart.id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender.send(Event::OrderCreated(order_id)).await;
        self.event_sender
            .send(Event::CheckoutCompleted { order_id, user_id })
            .await;
        self.event_sender
            .send(Event::PaymentInitiated {
                order_id,
                provider: method.provider,
            })
            .await;

        info!(%order_id, provider = %method.provider, total = %total, "checkout committed");

        Ok(CheckoutOutcome {
            order,
            payment: charge.client_payload,
        })
    }
}

/// Converts a decimal amount to integer minor units for the gateway
/// boundary (cents for usd).
fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::InternalError(format!("amount {} out of range", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(20.00)).unwrap(), 2000);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(19.995)).unwrap(), 2000);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn checkout_request_requires_address_and_method() {
        let request = CheckoutRequest {
            shipping_address: String::new(),
            payment_method: "cash on delivery".into(),
        };
        assert!(request.validate().is_err());

        let request = CheckoutRequest {
            shipping_address: "1 Main St".into(),
            payment_method: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
