pub mod carts;
pub mod checkout;
pub mod orders;
pub mod payment_methods;
pub mod payments;
pub mod wishlists;

pub use carts::CartService;
pub use checkout::CheckoutService;
pub use orders::OrderService;
pub use payment_methods::PaymentMethodService;
pub use payments::PaymentConfirmationService;
pub use wishlists::WishlistService;
