//! Emporium Core - Shared domain types.
//!
//! This crate provides the types used across all Emporium components:
//! - `api` - The REST backend (auth, catalog, orders)
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here can be unit tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, roles, slugs, pagination and order pricing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
