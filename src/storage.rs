//! Media store for uploaded data files.
//!
//! Files live under `<media_root>/<uploader_id>/<uuid>_<sanitized name>`.
//! The database only keeps the relative `stored_name`; every path coming
//! back from the database is re-validated before touching the disk.

use std::path::{Component, Path, PathBuf};

use base64::Engine;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Longest sanitized file name component kept on disk.
const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("File exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("Invalid stored file name: {0}")]
    InvalidName(String),
    #[error("Stored file missing: {0}")]
    Missing(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of persisting an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Base64 SHA-256 of the content.
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Write `bytes` for `uploader_id` and describe the stored file.
    pub fn save(
        &self,
        uploader_id: &Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let clean = sanitize_filename(original_name);
        let stored_name = format!("{uploader_id}/{}_{clean}", Uuid::new_v4());
        let path = self.resolve(&stored_name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;

        let content_type = mime_guess::from_path(&clean)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        tracing::debug!(stored_name, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            stored_name,
            content_type,
            size_bytes: bytes.len() as u64,
            sha256: content_hash(bytes),
        })
    }

    pub fn read(&self, stored_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(stored_name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::Missing(stored_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored file. Already-missing files are not an error.
    pub fn delete(&self, stored_name: &str) -> Result<(), StorageError> {
        let path = self.resolve(stored_name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of several files; failures are logged.
    pub fn delete_all<'a>(&self, stored_names: impl IntoIterator<Item = &'a str>) {
        for name in stored_names {
            if let Err(e) = self.delete(name) {
                tracing::warn!(stored_name = name, error = %e, "Failed to remove stored file");
            }
        }
    }

    fn resolve(&self, stored_name: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(stored_name);
        let only_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if stored_name.is_empty() || !only_normal {
            return Err(StorageError::InvalidName(stored_name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Base64 SHA-256 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(bytes))
}

/// Sanitize a client-supplied file name: drop directories, keep
/// `[A-Za-z0-9._-]`, strip `..`, cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let sanitized: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.replace("..", "");
    let sanitized: String = sanitized.chars().take(MAX_NAME_CHARS).collect();
    let sanitized = sanitized.trim_start_matches('.').to_string();

    if sanitized.is_empty() {
        "file".into()
    } else {
        sanitized
    }
}
