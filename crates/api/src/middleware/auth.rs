//! Session and role gates.
//!
//! Both gates are extractors. A handler that takes [`Authenticated`] only runs
//! for a request carrying a valid session cookie whose user still exists; one
//! that takes [`AdminOnly`] additionally requires the `admin` role. The
//! resolved [`Identity`] is handed to the handler.
//!
//! ```rust,ignore
//! async fn me(Authenticated(identity): Authenticated) -> Json<Identity> {
//!     Json(identity)
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::db::Store;
use crate::error::{
    AppError, MSG_ADMIN_REQUIRED, MSG_LOGIN_REQUIRED, MSG_USER_GONE, set_sentry_user,
};
use crate::models::Identity;
use crate::services::images::ImageHost;
use crate::services::tokens::token_from_headers;
use crate::state::AppState;

/// Extractor that requires a valid session.
///
/// Rejections:
/// - no `token` cookie: `Unauthenticated`
/// - bad signature or expired token: `InvalidSession`
/// - the token's user no longer exists: `Unauthenticated`
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S: Store, H: ImageHost> FromRequestParts<AppState<S, H>> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, H>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| AppError::Unauthenticated(MSG_LOGIN_REQUIRED.to_string()))?;

        let user_id = state.tokens().verify(&token)?;

        let user = state
            .store()
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated(MSG_USER_GONE.to_string()))?;

        let identity = user.identity();
        set_sentry_user(&identity.id, Some(identity.email.as_str()));

        Ok(Self(identity))
    }
}

/// Extractor that requires a valid session with the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub Identity);

impl<S: Store, H: ImageHost> FromRequestParts<AppState<S, H>> for AdminOnly {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, H>,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated(identity) = Authenticated::from_request_parts(parts, state).await?;

        if !identity.is_admin() {
            tracing::warn!(user_id = %identity.id, path = %parts.uri.path(), "Admin route denied");
            return Err(AppError::Forbidden(MSG_ADMIN_REQUIRED.to_string()));
        }

        Ok(Self(identity))
    }
}
