//! Authentication route handlers.
//!
//! Login and registration issue a session token in the `token` cookie;
//! logout overwrites it with an expired one.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::error::{Result, clear_sentry_user};
use crate::middleware::Authenticated;
use crate::models::{Identity, User};
use crate::routes::extract::ApiJson;
use crate::routes::{Envelope, NoData};
use crate::services::auth::AuthService;
use crate::services::images::ImageHost;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Login request body.
///
/// Fields default to empty so a missing field is reported by the service
/// with the envelope message rather than as a JSON rejection.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: Identity,
}

// =============================================================================
// Handlers
// =============================================================================

pub fn router<S: Store, H: ImageHost>() -> axum::Router<AppState<S, H>> {
    Router::new()
        .route("/register", post(register::<S, H>))
        .route("/login", post(login::<S, H>))
        .route("/logout", post(logout::<S, H>))
        .route("/me", get(me))
}

/// Create an account and start a session.
#[tracing::instrument(skip_all)]
async fn register<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<Response> {
    let user = AuthService::new(state.store())
        .register(&body.name, &body.email, &body.password)
        .await?;

    tracing::info!(user_id = %user.id, "User registered");
    session_response(&state, StatusCode::CREATED, "Registration successful", &user)
}

/// Verify credentials and start a session.
#[tracing::instrument(skip_all)]
async fn login<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Response> {
    let user = AuthService::new(state.store())
        .login(&body.email, &body.password)
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");
    session_response(&state, StatusCode::OK, "Login successful", &user)
}

/// End the session by expiring the cookie.
async fn logout<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
) -> Result<impl IntoResponse> {
    clear_sentry_user();
    let cookie = state.tokens().removal_cookie()?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(Envelope::with_message("Logged out successfully", NoData {})),
    ))
}

/// The identity attached to the current session.
async fn me(Authenticated(identity): Authenticated) -> Json<Envelope<UserData>> {
    Json(Envelope::ok(UserData { user: identity }))
}

fn session_response<S, H>(
    state: &AppState<S, H>,
    status: StatusCode,
    message: &'static str,
    user: &User,
) -> Result<Response> {
    let token = state.tokens().issue(user.id)?;
    let cookie = state.tokens().session_cookie(&token)?;

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(Envelope::with_message(
            message,
            UserData {
                user: user.identity(),
            },
        )),
    )
        .into_response())
}
