//! Persistence for the shop.
//!
//! Handlers talk to storage through the store traits below. Two backends
//! implement them:
//!
//! - [`PgStore`] - `PostgreSQL` through sqlx, used in production
//! - [`MemoryStore`] - in-process maps behind a lock, used by tests
//!
//! Both enforce the same uniqueness rules: user emails are unique, category
//! names are unique ignoring case, and category slugs are unique.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

mod memory;
mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use emporium_core::{
    CategoryId, Email, OrderId, Pagination, ProductId, Role, Slug, Sort, UserId,
};

use crate::models::{
    Category, CategoryChanges, CategoryFilter, CategorySort, NewCategory, NewOrder, NewProduct,
    NewUser, Order, OrderFilter, OrderSort, OrderStatus, Product, ProductChanges, ProductFilter,
    ProductSort, UpdatedProduct, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation (e.g., duplicate email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Foreign key violation: a referenced row is missing or still in use.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// A page of records plus the total count matching the filter.
pub type Page<T> = (Vec<T>, u64);

/// Credential store.
pub trait UserStore {
    /// Insert a user. Fails with [`RepositoryError::Conflict`] if the email
    /// is taken.
    fn create_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Look up a user by exact email.
    fn get_user_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Look up a user by id.
    fn get_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Change a user's role. Returns `None` if no user has this email.
    fn set_user_role(
        &self,
        email: &Email,
        role: Role,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;
}

/// Category collection.
pub trait CategoryStore {
    /// Insert a category. Fails with [`RepositoryError::Conflict`] if the
    /// name (ignoring case) or slug is taken.
    fn create_category(
        &self,
        category: NewCategory,
    ) -> impl Future<Output = Result<Category, RepositoryError>> + Send;

    fn list_categories(
        &self,
        filter: &CategoryFilter,
        sort: Sort<CategorySort>,
        page: Pagination,
    ) -> impl Future<Output = Result<Page<Category>, RepositoryError>> + Send;

    fn get_category(
        &self,
        id: CategoryId,
    ) -> impl Future<Output = Result<Option<Category>, RepositoryError>> + Send;

    fn get_category_by_slug(
        &self,
        slug: &Slug,
    ) -> impl Future<Output = Result<Option<Category>, RepositoryError>> + Send;

    /// Update a category in place. Returns `None` if the slug is unknown.
    fn update_category(
        &self,
        slug: &Slug,
        changes: CategoryChanges,
    ) -> impl Future<Output = Result<Option<Category>, RepositoryError>> + Send;

    /// Delete a category. Fails with [`RepositoryError::InvalidReference`]
    /// while products still belong to it.
    fn delete_category(
        &self,
        slug: &Slug,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Product catalog.
pub trait ProductStore {
    /// Insert a product. Fails with [`RepositoryError::InvalidReference`] if
    /// the category does not exist.
    fn create_product(
        &self,
        product: NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    fn list_products(
        &self,
        filter: &ProductFilter,
        sort: Sort<ProductSort>,
        page: Pagination,
    ) -> impl Future<Output = Result<Page<Product>, RepositoryError>> + Send;

    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Fetch every listed product that exists, in no particular order.
    fn get_products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Apply changes, returning the product and any image the change replaced.
    fn update_product(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> impl Future<Output = Result<Option<UpdatedProduct>, RepositoryError>> + Send;

    /// Delete a product, returning the removed row.
    fn delete_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;
}

/// Orders and their line items.
pub trait OrderStore {
    /// Insert an order with its items atomically.
    fn create_order(
        &self,
        order: NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn list_orders(
        &self,
        filter: &OrderFilter,
        sort: Sort<OrderSort>,
        page: Pagination,
    ) -> impl Future<Output = Result<Page<Order>, RepositoryError>> + Send;

    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Overwrite the payment and delivery state.
    fn update_order_status(
        &self,
        id: OrderId,
        status: &OrderStatus,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn delete_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Everything the API needs from storage.
pub trait Store:
    UserStore + CategoryStore + ProductStore + OrderStore + Send + Sync + 'static
{
    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
