//! Session tokens and the cookie that carries them.
//!
//! A session is a stateless HS256 JWT with claims `{ sub, iat, exp }`. It is
//! valid while the signature verifies and `exp` has not passed; there is no
//! server-side session table. The token travels in the `token` cookie.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use emporium_core::UserId;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "token";

/// Session lifetime: 30 days.
pub const SESSION_TTL_DAYS: i64 = 30;

/// Errors from issuing or verifying session tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, expiry or format check failed.
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    /// The subject claim is not a user id.
    #[error("token subject is not a user id")]
    Subject,

    /// Signing failed.
    #[error("failed to sign token: {0}")]
    Encode(jsonwebtoken::errors::Error),

    /// The cookie could not be rendered as a header value.
    #[error("invalid cookie header: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string.
    pub sub: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expires at (seconds since epoch).
    pub exp: i64,
}

/// Signs and verifies session tokens and builds the session cookie.
#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    secure_cookie: bool,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("keys", &"[REDACTED]")
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

impl SessionTokens {
    /// Create token keys from the signing secret.
    ///
    /// `secure_cookie` marks the cookie `Secure` (production only).
    #[must_use]
    pub fn new(secret: &SecretString, secure_cookie: bool) -> Self {
        let bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
            secure_cookie,
        }
    }

    /// Issue a token for a user, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if it had been created at `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_at(&self, user_id: UserId, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Encode)
    }

    /// Verify a token and return the user it names.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` on a bad signature, expiry or format, and
    /// `TokenError::Subject` if the subject is not a user id.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(TokenError::Invalid)?;

        data.claims.sub.parse().map_err(|_| TokenError::Subject)
    }

    /// `Set-Cookie` value that starts a session.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Header` if the token contains invalid header bytes.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, TokenError> {
        let cookie = self
            .cookie_builder(token.to_owned())
            .max_age(cookie::time::Duration::days(SESSION_TTL_DAYS))
            .build();
        Ok(HeaderValue::from_str(&cookie.to_string())?)
    }

    /// `Set-Cookie` value that ends a session: empty value, zero max-age and
    /// the same attributes as the session cookie.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Header` if the header cannot be built.
    pub fn removal_cookie(&self) -> Result<HeaderValue, TokenError> {
        let cookie = self
            .cookie_builder(String::new())
            .max_age(cookie::time::Duration::ZERO)
            .build();
        Ok(HeaderValue::from_str(&cookie.to_string())?)
    }

    fn cookie_builder(&self, value: String) -> cookie::CookieBuilder<'static> {
        Cookie::build((COOKIE_NAME, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure_cookie)
    }
}

/// Read the session token from the request's `Cookie` headers.
///
/// Empty values count as absent.
#[must_use]
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == COOKIE_NAME && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_owned())
}
