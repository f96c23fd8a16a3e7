//! Core types for Emporium.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod pagination;
pub mod pricing;
pub mod role;
pub mod slug;

pub use email::{Email, EmailError};
pub use id::*;
pub use pagination::{PageInfo, Pagination, Sort, SortDirection, SortError, SortField};
pub use pricing::{LineItem, MAX_AMOUNT, OrderTotals, PricingError, money};
pub use role::{Role, RoleError};
pub use slug::{Slug, SlugError};
