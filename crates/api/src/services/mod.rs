//! Business logic services.

pub mod auth;
pub mod images;
pub mod tokens;
pub mod upload;
