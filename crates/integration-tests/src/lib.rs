//! Integration tests for the Emporium API.
//!
//! Every test drives the real router through `axum_test::TestServer`. The
//! database is the in-memory store and the image host is
//! [`RecordingImageHost`], which never leaves the process and remembers what
//! it was asked to do.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p emporium-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_test::TestServer;
use cookie::Cookie;
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::{Value, json};

use emporium_api::config::{ApiConfig, CloudinaryConfig, Environment};
use emporium_api::db::MemoryStore;
use emporium_api::routes;
use emporium_api::services::auth::AuthService;
use emporium_api::services::images::{ImageHost, ImageHostError, UploadedImage};
use emporium_api::services::tokens::{COOKIE_NAME, SessionTokens};
use emporium_api::state::AppState;
use emporium_core::Role;

/// Signing secret used by every test server.
pub const JWT_SECRET: &str = "k9Vd2LxQ7mTz4RbW8nYc1HsJf6PgA3Ue";

/// Password given to accounts created by the helpers.
pub const PASSWORD: &str = "correct horse battery";

// =============================================================================
// Recording Image Host
// =============================================================================

#[derive(Debug, Default)]
struct Recorded {
    uploads: Vec<PathBuf>,
    destroyed: Vec<String>,
    fail_uploads: bool,
}

/// Image host that records calls instead of making them.
///
/// Uploaded images get the public id `ecommerce/products/img-<n>`.
#[derive(Debug, Clone, Default)]
pub struct RecordingImageHost {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingImageHost {
    /// Make every following upload fail as an unavailable host would.
    pub fn fail_uploads(&self) {
        self.recorded.lock().fail_uploads = true;
    }

    /// Number of successful upload calls.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.recorded.lock().uploads.len()
    }

    /// Public ids passed to `destroy`, in call order.
    #[must_use]
    pub fn destroyed(&self) -> Vec<String> {
        self.recorded.lock().destroyed.clone()
    }

    /// Staged paths that were uploaded.
    #[must_use]
    pub fn uploaded_paths(&self) -> Vec<PathBuf> {
        self.recorded.lock().uploads.clone()
    }
}

impl ImageHost for RecordingImageHost {
    async fn upload(&self, path: &Path, folder: &str) -> Result<UploadedImage, ImageHostError> {
        // The staged file must still exist while the host reads it
        if !path.exists() {
            return Err(ImageHostError::Parse(format!("missing file {}", path.display())));
        }

        let mut recorded = self.recorded.lock();
        if recorded.fail_uploads {
            return Err(ImageHostError::Api {
                status: 503,
                message: "upload unavailable".to_string(),
            });
        }
        recorded.uploads.push(path.to_path_buf());
        let n = recorded.uploads.len();

        Ok(UploadedImage {
            secure_url: format!("https://images.test/{folder}/img-{n}.png"),
            public_id: format!("{folder}/img-{n}"),
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), ImageHostError> {
        self.recorded.lock().destroyed.push(public_id.to_string());
        Ok(())
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// A running test server plus handles on its collaborators.
pub struct TestContext {
    pub server: TestServer,
    pub store: MemoryStore,
    pub images: RecordingImageHost,
    pub tokens: SessionTokens,
    upload_dir: tempfile::TempDir,
}

impl TestContext {
    /// Start a server over an empty store.
    #[must_use]
    pub fn new() -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let config = test_config(upload_dir.path());
        let tokens = SessionTokens::new(&config.jwt_secret, false);

        let store = MemoryStore::new();
        let images = RecordingImageHost::default();
        let state = AppState::new(config, store.clone(), images.clone());

        let server = TestServer::new(routes::app(state)).unwrap();

        Self {
            server,
            store,
            images,
            tokens,
            upload_dir,
        }
    }

    /// The staging directory uploads are written to.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        self.upload_dir.path()
    }

    /// Register a user over HTTP and return its session cookie.
    pub async fn register(&self, name: &str, email: &str) -> Cookie<'static> {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({ "name": name, "email": email, "password": PASSWORD }))
            .await;
        assert_eq!(response.status_code(), 201, "{}", response.text());
        session_cookie(&response)
    }

    /// Create an admin directly in the store, log in, and return the cookie.
    pub async fn admin(&self) -> Cookie<'static> {
        AuthService::new(&self.store)
            .create_account("Admin", "admin@example.com", PASSWORD, Role::Admin)
            .await
            .unwrap();

        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": "admin@example.com", "password": PASSWORD }))
            .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        session_cookie(&response)
    }

    /// Create a category as `admin` and return its JSON.
    pub async fn create_category(&self, admin: &Cookie<'static>, name: &str) -> Value {
        let response = self
            .server
            .post("/api/categories")
            .add_cookie(admin.clone())
            .json(&json!({ "name": name }))
            .await;
        assert_eq!(response.status_code(), 201, "{}", response.text());
        response.json::<Value>()["category"].clone()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The session cookie set by a response.
#[must_use]
pub fn session_cookie(response: &axum_test::TestResponse) -> Cookie<'static> {
    let cookie = response.cookie(COOKIE_NAME);
    Cookie::new(COOKIE_NAME, cookie.value().to_string())
}

fn test_config(upload_dir: &Path) -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        environment: Environment::Development,
        jwt_secret: SecretString::from(JWT_SECRET),
        upload_dir: upload_dir.to_path_buf(),
        cloudinary: CloudinaryConfig {
            cloud_name: "test".to_string(),
            api_key: "key".to_string(),
            api_secret: SecretString::from("secret"),
        },
        cors_origin: None,
        sentry_dsn: None,
    }
}
