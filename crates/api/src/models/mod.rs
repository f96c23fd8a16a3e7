//! Domain models for the API.
//!
//! These types are what stores return and handlers serialize. Row types used
//! by the `PostgreSQL` store stay private to `db`.

pub mod category;
pub mod order;
pub mod product;
pub mod user;

pub use category::{Category, CategoryChanges, CategoryFilter, CategorySort, NewCategory};
pub use order::{
    NewOrder, Order, OrderFilter, OrderItem, OrderSort, OrderStatus, OrderStatusUpdate,
    PaymentResult, ShippingAddress,
};
pub use product::{
    NewProduct, Product, ProductChanges, ProductFilter, ProductImage, ProductSort, UpdatedProduct,
};
pub use user::{Identity, NewUser, User};

/// Case-insensitive substring match used by keyword filters.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
