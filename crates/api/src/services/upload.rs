//! Upload relay: stage an incoming image locally, then forward it to the
//! image host.
//!
//! Validation (type and size) happens while the multipart part is read, so an
//! invalid file never reaches the host. The staged copy is owned by a
//! [`StagedUpload`] guard and removed when the guard drops, whether the relay
//! succeeded, failed, or the request was cancelled.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::images::{ImageHost, ImageHostError, PRODUCT_FOLDER, UploadedImage};

/// Largest accepted image: 5 MiB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Errors raised while receiving an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Not a JPEG or PNG.
    #[error("Only .jpg, .jpeg and .png images are allowed")]
    UnsupportedType,

    /// Larger than [`MAX_IMAGE_BYTES`].
    #[error("Image must be at most 5 MB")]
    TooLarge,

    /// The multipart body could not be read.
    #[error("{0}")]
    Multipart(String),

    /// Writing the staged file failed.
    #[error("staging failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Identify the format from the part's content type, or from the file
    /// extension when no content type was sent.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` for anything else.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Result<Self, UploadError> {
        if let Some(content_type) = content_type {
            return match content_type.to_ascii_lowercase().as_str() {
                "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
                "image/png" => Ok(Self::Png),
                _ => Err(UploadError::UnsupportedType),
            };
        }

        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => Err(UploadError::UnsupportedType),
        }
    }

    /// File extension used for the staged copy.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// A staged image on local disk, deleted on drop.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    size: usize,
}

impl StagedUpload {
    /// Location of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed staged upload"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}

/// Streams chunks into a new staged file, enforcing the size limit.
#[derive(Debug)]
pub struct StagingWriter {
    staged: StagedUpload,
    file: File,
}

impl StagingWriter {
    /// Create `image-<uuid>.<ext>` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the file cannot be created.
    pub async fn create(dir: &Path, kind: ImageKind) -> Result<Self, UploadError> {
        let staged = StagedUpload {
            path: dir.join(format!("image-{}.{}", Uuid::new_v4(), kind.extension())),
            size: 0,
        };
        let file = File::create(&staged.path).await?;
        Ok(Self { staged, file })
    }

    /// Append a chunk.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::TooLarge` once the total passes the limit; the
    /// partial file is removed when the writer is dropped.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let size = self.staged.size.saturating_add(chunk.len());
        if size > MAX_IMAGE_BYTES {
            return Err(UploadError::TooLarge);
        }
        self.file.write_all(chunk).await?;
        self.staged.size = size;
        Ok(())
    }

    /// Flush and hand over the staged file.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if flushing fails.
    pub async fn finish(mut self) -> Result<StagedUpload, UploadError> {
        self.file.flush().await?;
        Ok(self.staged)
    }
}

/// Validate a multipart file part and stream it to disk.
///
/// # Errors
///
/// Returns `UploadError` if the type is not allowed, the file is too large,
/// the body is malformed, or the disk write fails.
pub async fn stage_field(mut field: Field<'_>, dir: &Path) -> Result<StagedUpload, UploadError> {
    let kind = ImageKind::detect(field.content_type(), field.file_name())?;
    let mut writer = StagingWriter::create(dir, kind).await?;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        writer.write(&chunk).await?;
    }

    writer.finish().await
}

/// Forward a staged image to the host.
///
/// The staged file is removed as soon as the host answers.
///
/// # Errors
///
/// Returns the host's error if the upload fails.
pub async fn relay<H: ImageHost>(
    host: &H,
    staged: StagedUpload,
) -> Result<UploadedImage, ImageHostError> {
    let result = host.upload(staged.path(), PRODUCT_FOLDER).await;
    drop(staged);
    result
}
