//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Store;
use crate::services::images::ImageHost;
use crate::services::tokens::SessionTokens;

/// Application state shared across all handlers.
///
/// Generic over the store and the image host so tests can run the real router
/// against in-memory collaborators. Cloning is cheap (one `Arc`).
pub struct AppState<S, H> {
    inner: Arc<AppStateInner<S, H>>,
}

struct AppStateInner<S, H> {
    config: ApiConfig,
    tokens: SessionTokens,
    store: S,
    images: H,
}

impl<S, H> Clone for AppState<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store, H: ImageHost> AppState<S, H> {
    /// Create a new application state.
    ///
    /// Session token keys are derived from `config.jwt_secret` once here.
    #[must_use]
    pub fn new(config: ApiConfig, store: S, images: H) -> Self {
        let tokens = SessionTokens::new(&config.jwt_secret, config.secure_cookies());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                tokens,
                store,
                images,
            }),
        }
    }
}

impl<S, H> AppState<S, H> {
    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Session token signer and verifier.
    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.inner.tokens
    }

    /// The persistence backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// The external image host.
    #[must_use]
    pub fn images(&self) -> &H {
        &self.inner.images
    }
}
