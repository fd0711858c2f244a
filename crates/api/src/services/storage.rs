//! Product image storage on the local filesystem.
//!
//! Files live under `<upload_dir>/products/<product_id>/<colour_id>/` with
//! a random name. The database stores the path relative to the upload dir,
//! which is also the path under `/media` that serves it.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use vastra_core::{ColourId, ProductId};

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Accepted extensions, lowercase.
const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Errors from image storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported image type (allowed: jpg, jpeg, png, webp)")]
    UnsupportedType,

    #[error("image exceeds {MAX_IMAGE_BYTES} bytes")]
    TooLarge,

    #[error("image is empty")]
    Empty,

    #[error("invalid stored path")]
    InvalidPath,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes and removes product images.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory files are stored under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store an uploaded image and return its relative path.
    ///
    /// The type is taken from the file name's extension, falling back to the
    /// content type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnsupportedType`, `StorageError::Empty` or
    /// `StorageError::TooLarge` for rejected uploads, `StorageError::Io` if
    /// the write fails.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn store(
        &self,
        product_id: ProductId,
        colour_id: ColourId,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let ext = image_extension(file_name, content_type).ok_or(StorageError::UnsupportedType)?;
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(StorageError::TooLarge);
        }

        let dir = format!("products/{product_id}/{colour_id}");
        let relative = format!("{dir}/{}.{ext}", Uuid::new_v4());

        tokio::fs::create_dir_all(self.root.join(&dir)).await?;
        tokio::fs::write(self.root.join(&relative), bytes).await?;

        tracing::debug!(path = %relative, "Stored image");
        Ok(relative)
    }

    /// Remove a stored image. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidPath` if `relative` escapes the upload
    /// dir, `StorageError::Io` if the removal fails.
    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let path = Path::new(relative);
        if path.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidPath);
        }

        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn image_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<&'static str> {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| ALLOWED_EXTENSIONS.iter().copied().find(|a| *a == ext));

    from_name.or_else(|| match content_type? {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Some("a.JPG"), None), Some("jpg"));
        assert_eq!(image_extension(Some("a.jpeg"), None), Some("jpeg"));
        assert_eq!(image_extension(Some("blob"), Some("image/webp")), Some("webp"));
        assert_eq!(image_extension(Some("a.gif"), Some("image/gif")), None);
        assert_eq!(image_extension(None, None), None);
    }

    #[tokio::test]
    async fn test_store_writes_under_product_and_colour() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path());

        let path = storage
            .store(ProductId::new(3), ColourId::new(7), Some("front.png"), None, b"png")
            .await
            .unwrap();

        assert!(path.starts_with("products/3/7/"));
        assert!(path.ends_with(".png"));
        assert_eq!(std::fs::read(dir.path().join(&path)).unwrap(), b"png");

        storage.delete(&path).await.unwrap();
        assert!(!dir.path().join(&path).exists());
        // Deleting twice is fine.
        storage.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_rejects_bad_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path());
        let (p, c) = (ProductId::new(1), ColourId::new(1));

        assert!(matches!(
            storage.store(p, c, Some("x.exe"), None, b"MZ").await,
            Err(StorageError::UnsupportedType)
        ));
        assert!(matches!(
            storage.store(p, c, Some("x.png"), None, b"").await,
            Err(StorageError::Empty)
        ));
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            storage.store(p, c, Some("x.png"), None, &big).await,
            Err(StorageError::TooLarge)
        ));
    }

    #[tokio::test]
    async fn test_delete_refuses_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path());
        assert!(matches!(
            storage.delete("../etc/passwd").await,
            Err(StorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.delete("/etc/passwd").await,
            Err(StorageError::InvalidPath)
        ));
    }
}
