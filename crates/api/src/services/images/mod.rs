//! External image hosting.
//!
//! Product images live on an external host. The API only keeps the public URL
//! and the host's id for each image.

mod cloudinary;

use std::future::Future;
use std::path::Path;

use thiserror::Error;

use crate::models::ProductImage;

pub use cloudinary::CloudinaryClient;

/// Folder product images are stored under on the host.
pub const PRODUCT_FOLDER: &str = "ecommerce/products";

/// Errors that can occur when talking to the image host.
#[derive(Debug, Error)]
pub enum ImageHostError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The host answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The staged file could not be read.
    #[error("failed to read staged file: {0}")]
    Io(#[from] std::io::Error),

    /// The host's response was not understood.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// An image stored on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Public HTTPS URL.
    pub secure_url: String,
    /// Id used to delete the image later.
    pub public_id: String,
}

impl From<UploadedImage> for ProductImage {
    fn from(image: UploadedImage) -> Self {
        Self {
            url: image.secure_url,
            public_id: image.public_id,
        }
    }
}

/// An external image store.
pub trait ImageHost: Send + Sync + 'static {
    /// Upload a local file into `folder`.
    fn upload(
        &self,
        path: &Path,
        folder: &str,
    ) -> impl Future<Output = Result<UploadedImage, ImageHostError>> + Send;

    /// Delete an image by its host id.
    fn destroy(&self, public_id: &str) -> impl Future<Output = Result<(), ImageHostError>> + Send;
}
