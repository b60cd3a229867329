//! Filesystem storage for uploaded media (video files, thumbnails, avatars).
//!
//! Files are stored flat under one base directory as `<uuid>.<ext>`, where
//! the extension is taken (sanitized) from the uploaded filename.  The store
//! hands back both the storage id and the public `/media/...` locator that
//! goes into the database.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// A stored media object: the on-disk file name and its public locator.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    /// Storage id, e.g. `9c5e...f1.mp4`.  Kept in the database for deletion.
    pub id: String,
    /// Public locator, e.g. `/media/9c5e...f1.mp4`.
    pub url: String,
}

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    // Canonicalize base; target may not exist yet so normalize manually
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(&canonical_base)
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {} // RootDir, CurDir, Prefix — skip
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Persist an uploaded file and return its storage id and public locator.
    pub async fn put(&self, data: &[u8], original_name: &str) -> Result<StoredMedia, ServerError> {
        if data.is_empty() {
            return Err(ServerError::MediaStorage("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::UploadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), sanitize_extension(original_name));
        let path = self.safe_media_path(&file_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to write media {file_name}: {e}"))
        })?;

        debug!(file = %file_name, size = data.len(), "Stored media file");
        Ok(StoredMedia {
            url: format!("/media/{file_name}"),
            id: file_name,
        })
    }

    /// Read a stored file back, e.g. for serving.
    pub async fn get(&self, file_name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_media_path(file_name)?;

        if !path.exists() {
            return Err(ServerError::NotFound);
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to read media {file_name}: {e}"))
        })?;

        debug!(file = %file_name, size = data.len(), "Retrieved media file");
        Ok(data)
    }

    /// Remove a stored file.  Missing files are tolerated so that deleting a
    /// video whose media is already gone still succeeds.
    pub async fn delete(&self, file_name: &str) -> Result<(), ServerError> {
        let path = self.safe_media_path(file_name)?;

        if !path.exists() {
            debug!(file = %file_name, "Media file already absent");
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to delete media {file_name}: {e}"))
        })?;

        debug!(file = %file_name, "Deleted media file");
        Ok(())
    }

    /// Safe media path that validates against traversal.
    fn safe_media_path(&self, file_name: &str) -> Result<PathBuf, ServerError> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        let raw = self.base_path.join(file_name);
        ensure_within(&self.base_path, &raw)
    }
}

/// Keep only a short alphanumeric extension from the client-supplied name.
fn sanitize_extension(original_name: &str) -> String {
    let ext = original_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        ext
    } else {
        "bin".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _dir) = test_store().await;
        let data = b"video-bytes";

        let stored = store.put(data, "clip.mp4").await.unwrap();
        assert!(stored.id.ends_with(".mp4"));
        assert_eq!(stored.url, format!("/media/{}", stored.id));

        let retrieved = store.get(&stored.id).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_delete_is_tolerant() {
        let (store, _dir) = test_store().await;
        let stored = store.put(b"delete-me", "a.jpg").await.unwrap();

        store.delete(&stored.id).await.unwrap();
        assert!(store.get(&stored.id).await.is_err());

        // Second delete of the same id is a no-op.
        store.delete(&stored.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_too_large_rejected() {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 4).await.unwrap();
        assert!(matches!(
            store.put(b"12345", "big.mp4").await,
            Err(ServerError::UploadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.put(b"", "a.mp4").await.is_err());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.delete("..").await.is_err());
        assert!(store.get("").await.is_err());
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("movie.MP4"), "mp4");
        assert_eq!(sanitize_extension("noext"), "noext");
        assert_eq!(sanitize_extension("weird.<script>"), "bin");
        assert_eq!(sanitize_extension(""), "bin");
    }
}
