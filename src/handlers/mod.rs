pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod payment_methods;
pub mod payments;
pub mod wishlists;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::GatewayRegistry;
use crate::services::{
    CartService, CheckoutService, OrderService, PaymentConfirmationService, PaymentMethodService,
    WishlistService,
};

/// Aggregate of the services used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub payment_confirmation: Arc<PaymentConfirmationService>,
    pub wishlists: Arc<WishlistService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        gateways: GatewayRegistry,
        cfg: &AppConfig,
    ) -> Self {
        let payment_methods = Arc::new(PaymentMethodService::new(db.clone()));

        Self {
            carts: Arc::new(CartService::new(db.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                payment_methods.clone(),
                gateways.clone(),
                cfg.currency.clone(),
            )),
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                cfg.restock_on_cancel,
            )),
            wishlists: Arc::new(WishlistService::new(db.clone())),
            payment_confirmation: Arc::new(PaymentConfirmationService::new(
                db,
                event_sender,
                gateways,
            )),
            payment_methods,
        }
    }
}
