//! HTTP middleware and request gates.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost, added in `main`)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//!
//! Authentication is not a layer: handlers opt in by taking the
//! [`Authenticated`] or [`AdminOnly`] extractor.

pub mod auth;
pub mod request_id;

pub use auth::{AdminOnly, Authenticated};
pub use request_id::request_id_middleware;
