//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! Gates are the extractors a handler takes: `Authenticated` (session) or
//! `AdminOnly` (session + admin).
//!
//! ```text
//! GET    /health                  - Liveness
//! GET    /health/ready            - Database readiness
//!
//! # Auth
//! POST   /api/auth/register       - Create account, start session
//! POST   /api/auth/login          - Start session
//! POST   /api/auth/logout         - End session
//! GET    /api/auth/me             - Current identity            (session)
//!
//! # Categories
//! GET    /api/categories/public   - Active categories
//! GET    /api/categories          - All categories              (admin)
//! POST   /api/categories          - Create                      (admin)
//! GET    /api/categories/{slug}   - Detail
//! PUT    /api/categories/{slug}   - Update                      (admin)
//! DELETE /api/categories/{slug}   - Delete                      (admin)
//!
//! # Products
//! GET    /api/products            - Catalog
//! POST   /api/products            - Create, multipart `image`   (admin)
//! GET    /api/products/{id}       - Detail
//! PUT    /api/products/{id}       - Update, multipart `image`   (admin)
//! DELETE /api/products/{id}       - Delete                      (admin)
//!
//! # Orders
//! POST   /api/orders              - Place an order              (session)
//! GET    /api/orders              - All orders                  (admin)
//! GET    /api/orders/mine         - Caller's orders             (session)
//! GET    /api/orders/{id}         - Detail, owner or admin      (session)
//! PUT    /api/orders/{id}         - Payment/delivery status     (admin)
//! DELETE /api/orders/{id}         - Delete                      (admin)
//! ```

pub mod auth;
pub mod categories;
pub mod extract;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn,
    routing::get,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::db::Store;
use crate::middleware::request_id_middleware;
use crate::services::images::ImageHost;
use crate::state::AppState;

/// Success body: `{ "success": true, "message"?: ..., ...data }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(flatten)]
    data: T,
}

impl<T> Envelope<T> {
    /// Wrap `data` in a success envelope.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    /// Wrap `data` in a success envelope with a message.
    pub const fn with_message(message: &'static str, data: T) -> Self {
        Self {
            success: true,
            message: Some(message),
            data,
        }
    }
}

/// Empty payload for envelopes that only carry a message.
#[derive(Debug, Serialize)]
pub struct NoData {}

/// Create all `/api` routes.
pub fn routes<S: Store, H: ImageHost>() -> Router<AppState<S, H>> {
    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/categories", categories::router())
        .nest("/api/products", products::router())
        .nest("/api/orders", orders::router())
}

/// Build the complete application: health checks, API routes and the
/// tracing, request id and CORS layers.
///
/// Sentry layers are added by the binary on top of this.
pub fn app<S: Store, H: ImageHost>(state: AppState<S, H>) -> Router {
    let cors = cors_layer(state.config().cors_origin.as_deref());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S, H>))
        .merge(routes())
        .layer(cors)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// CORS policy.
///
/// With a configured origin, only that origin may call the API and cookies
/// are allowed. Without one, any origin may call it but without credentials.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };

    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]),
        Err(e) => {
            tracing::warn!(error = %e, "CORS_ORIGIN is not a valid header value, cross-origin requests disabled");
            CorsLayer::new()
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: Store, H: ImageHost>(State(state): State<AppState<S, H>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Data {
        count: u32,
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(Envelope::ok(Data { count: 2 })).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "success": true, "count": 2 }));

        let json = serde_json::to_value(Envelope::with_message("Deleted", NoData {}))
            .unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "success": true, "message": "Deleted" }));
    }
}
