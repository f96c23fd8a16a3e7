//! Emporium API library.
//!
//! The REST backend as a library, so the router can be driven by the binary
//! in `main.rs` and by the HTTP tests in `crates/integration-tests`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
