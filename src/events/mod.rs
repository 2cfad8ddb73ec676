use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::payment_method::PaymentProvider;

/// Domain events emitted after state changes commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    CheckoutCompleted {
        order_id: Uuid,
        user_id: Uuid,
    },
    PaymentInitiated {
        order_id: Uuid,
        provider: PaymentProvider,
    },
    PaymentConfirmed {
        order_id: Uuid,
        transaction_id: Uuid,
    },
    PaymentFailed {
        order_id: Uuid,
        transaction_id: Uuid,
    },
    PaymentRefunded {
        order_id: Uuid,
        transaction_id: Uuid,
    },
    StockRestocked {
        product_id: Uuid,
        quantity: i32,
    },
}

/// Cloneable handle for publishing events onto the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event; a full or closed channel is logged, never escalated,
    /// because events are emitted post-commit and must not fail the request.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("failed to publish event: {}", e);
        }
    }
}

/// Consumes events from the channel and logs them. Downstream consumers
/// (fulfillment email, analytics) would hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => info!(%order_id, "order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, %old_status, %new_status, "order status changed"),
            Event::OrderCancelled(order_id) => info!(%order_id, "order cancelled"),
            Event::CheckoutCompleted { order_id, user_id } => {
                info!(%order_id, %user_id, "checkout completed")
            }
            Event::PaymentInitiated { order_id, provider } => {
                info!(%order_id, %provider, "payment initiated")
            }
            Event::PaymentConfirmed {
                order_id,
                transaction_id,
            } => info!(%order_id, %transaction_id, "payment confirmed"),
            Event::PaymentFailed {
                order_id,
                transaction_id,
            } => info!(%order_id, %transaction_id, "payment failed"),
            Event::PaymentRefunded {
                order_id,
                transaction_id,
            } => info!(%order_id, %transaction_id, "payment refunded"),
            Event::StockRestocked {
                product_id,
                quantity,
            } => info!(%product_id, quantity, "stock restocked"),
        }
    }
}
