//! Sea-orm entity definitions for the storefront domain.

pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment_method;
pub mod payment_transaction;
pub mod product;
pub mod wishlist_item;

pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment_method::{Entity as PaymentMethod, Model as PaymentMethodModel, PaymentProvider};
pub use payment_transaction::{
    Entity as PaymentTransaction, Model as PaymentTransactionModel, TransactionStatus,
};
pub use product::{Entity as Product, Model as ProductModel};
pub use wishlist_item::{Entity as WishlistItem, Model as WishlistItemModel};
