//! Local file storage for product images.

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_list, env_or_default, env_parse};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};

/// Where uploads go and what they may look like
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root_path: PathBuf,
    pub upload_folder: String,
    pub max_file_size_bytes: u64,
    /// Lowercase, with the leading dot
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./wwwroot"),
            upload_folder: "uploads".to_string(),
            max_file_size_bytes: 1024 * 1024,
            allowed_extensions: [".jpg", ".jpeg", ".png", ".webp"]
                .map(str::to_string)
                .to_vec(),
            allowed_content_types: ["image/jpeg", "image/png", "image/webp"]
                .map(str::to_string)
                .to_vec(),
        }
    }
}

impl FromEnv for StorageConfig {
    /// - CATALOG_STORAGE_ROOT: defaults to ./wwwroot
    /// - CATALOG_UPLOAD_FOLDER: defaults to uploads
    /// - CATALOG_MAX_FILE_SIZE_BYTES: defaults to 1048576
    /// - CATALOG_ALLOWED_EXTENSIONS, CATALOG_ALLOWED_CONTENT_TYPES: comma-separated
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            root_path: PathBuf::from(env_or_default("CATALOG_STORAGE_ROOT", "./wwwroot")),
            upload_folder: env_or_default("CATALOG_UPLOAD_FOLDER", "uploads"),
            max_file_size_bytes: env_parse("CATALOG_MAX_FILE_SIZE_BYTES", "1048576")?,
            allowed_extensions: env_list("CATALOG_ALLOWED_EXTENSIONS", ".jpg,.jpeg,.png,.webp")
                .into_iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            allowed_content_types: env_list(
                "CATALOG_ALLOWED_CONTENT_TYPES",
                "image/jpeg,image/png,image/webp",
            ),
        })
    }
}

impl StorageConfig {
    /// Upload folder without surrounding slashes; public URLs start with it
    pub fn folder(&self) -> &str {
        self.upload_folder.trim_matches('/')
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.root_path.join(self.folder())
    }
}

/// A file received from a multipart upload
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Why an upload was refused, checked in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("File is required.")]
    Missing,
    #[error("Image size must be less than {0} bytes.")]
    TooLarge(u64),
    #[error("Invalid file extension.")]
    Extension,
    #[error("Invalid image content type.")]
    ContentType,
}

impl UploadRejection {
    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::TooLarge(_) => "too_large",
            Self::Extension => "extension",
            Self::ContentType => "content_type",
        }
    }
}

/// `.png` style extension of a file name, if any
fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
}

/// Check an upload against the configured limits.
pub fn check_upload<'a>(
    config: &StorageConfig,
    upload: Option<&'a ImageUpload>,
) -> Result<&'a ImageUpload, UploadRejection> {
    let upload = match upload {
        Some(upload) if !upload.bytes.is_empty() => upload,
        _ => return Err(UploadRejection::Missing),
    };

    if upload.bytes.len() as u64 > config.max_file_size_bytes {
        return Err(UploadRejection::TooLarge(config.max_file_size_bytes));
    }

    let extension_allowed = extension_of(&upload.file_name).is_some_and(|ext| {
        config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    });
    if !extension_allowed {
        return Err(UploadRejection::Extension);
    }

    let content_type_allowed = upload
        .content_type
        .as_deref()
        .is_some_and(|ct| config.allowed_content_types.iter().any(|allowed| allowed == ct));
    if !content_type_allowed {
        return Err(UploadRejection::ContentType);
    }

    Ok(upload)
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store the bytes under a fresh name and return the public path
    async fn save_image(
        &self,
        bytes: &[u8],
        original_file_name: &str,
        cancel: &CancellationToken,
    ) -> CatalogResult<String>;

    /// Best effort: failures are logged, never returned
    async fn delete_if_exists(&self, public_path: &str);
}

/// Stores images under `<root>/<upload_folder>/<uuid><ext>`
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    config: StorageConfig,
}

impl LocalFileStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save_image(
        &self,
        bytes: &[u8],
        original_file_name: &str,
        cancel: &CancellationToken,
    ) -> CatalogResult<String> {
        let dir = self.config.upload_dir();
        let file_name = format!(
            "{}{}",
            Uuid::new_v4(),
            extension_of(original_file_name).unwrap_or_default()
        );
        let physical_path = dir.join(&file_name);

        let write = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&physical_path, bytes).await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // A partial file may be left behind
                let _ = tokio::fs::remove_file(&physical_path).await;
                return Err(CatalogError::Cancelled);
            }
            result = write => result?,
        }

        tracing::info!(path = %physical_path.display(), size = bytes.len(), "Stored product image");
        Ok(format!("/{}/{}", self.config.folder(), file_name))
    }

    async fn delete_if_exists(&self, public_path: &str) {
        if public_path.trim().is_empty() {
            return;
        }

        // Only the file name is trusted; the folder always comes from config
        let Some(file_name) = Path::new(public_path.trim()).file_name() else {
            return;
        };
        let physical_path = self.config.upload_dir().join(file_name);

        match tokio::fs::remove_file(&physical_path).await {
            Ok(()) => tracing::info!(path = %physical_path.display(), "Deleted product image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                error = %e,
                public_path,
                "Failed to delete image file"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(file_name: &str, content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: file_name.to_string(),
            content_type: Some(content_type.to_string()),
            bytes: vec![1; len],
        }
    }

    fn storage(root: &Path) -> LocalFileStorage {
        LocalFileStorage::new(StorageConfig {
            root_path: root.to_path_buf(),
            upload_folder: "/uploads/".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_check_upload_order() {
        let config = StorageConfig {
            max_file_size_bytes: 10,
            ..Default::default()
        };

        assert_eq!(check_upload(&config, None).unwrap_err(), UploadRejection::Missing);
        assert_eq!(
            check_upload(&config, Some(&upload("a.png", "image/png", 0))).unwrap_err(),
            UploadRejection::Missing
        );
        assert_eq!(
            check_upload(&config, Some(&upload("a.exe", "text/plain", 11))).unwrap_err(),
            UploadRejection::TooLarge(10)
        );
        assert_eq!(
            check_upload(&config, Some(&upload("a.exe", "text/plain", 5))).unwrap_err(),
            UploadRejection::Extension
        );
        assert_eq!(
            check_upload(&config, Some(&upload("a.PNG", "text/plain", 5))).unwrap_err(),
            UploadRejection::ContentType
        );
        assert!(check_upload(&config, Some(&upload("a.PNG", "image/png", 5))).is_ok());
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            UploadRejection::TooLarge(1048576).to_string(),
            "Image size must be less than 1048576 bytes."
        );
        assert_eq!(UploadRejection::Extension.to_string(), "Invalid file extension.");
    }

    #[test]
    fn test_storage_config_from_env() {
        temp_env::with_vars(
            [
                ("CATALOG_UPLOAD_FOLDER", Some("images")),
                ("CATALOG_MAX_FILE_SIZE_BYTES", Some("2048")),
                ("CATALOG_ALLOWED_EXTENSIONS", Some(".PNG, .gif")),
            ],
            || {
                let config = StorageConfig::from_env().unwrap();
                assert_eq!(config.upload_folder, "images");
                assert_eq!(config.max_file_size_bytes, 2048);
                assert_eq!(config.allowed_extensions, vec![".png", ".gif"]);
            },
        );
    }

    #[test]
    fn test_storage_config_rejects_bad_size() {
        temp_env::with_var("CATALOG_MAX_FILE_SIZE_BYTES", Some("big"), || {
            assert!(StorageConfig::from_env().is_err());
        });
    }

    #[tokio::test]
    async fn test_save_then_delete() {
        let root = tempfile::tempdir().unwrap();
        let storage = storage(root.path());
        let cancel = CancellationToken::new();

        let public_path = storage.save_image(b"png", "photo.png", &cancel).await.unwrap();
        assert!(public_path.starts_with("/uploads/"));
        assert!(public_path.ends_with(".png"));

        let file_name = public_path.rsplit('/').next().unwrap();
        let physical = root.path().join("uploads").join(file_name);
        assert_eq!(std::fs::read(&physical).unwrap(), b"png");

        storage.delete_if_exists(&public_path).await;
        assert!(!physical.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_quiet() {
        let root = tempfile::tempdir().unwrap();
        let storage = storage(root.path());

        storage.delete_if_exists("/uploads/nothing.png").await;
        storage.delete_if_exists("   ").await;
    }

    #[tokio::test]
    async fn test_delete_ignores_directories_in_path() {
        let root = tempfile::tempdir().unwrap();
        let outside = root.path().join("keep.png");
        std::fs::write(&outside, b"x").unwrap();

        storage(root.path()).delete_if_exists("/../keep.png").await;
        assert!(outside.exists());
    }
}
