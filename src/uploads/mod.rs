//! Storage for uploaded model files
//!
//! Uploads are validated (extension, size, STL header) and written under a
//! generated name. The generated name doubles as the upload id that quote
//! requests refer to.

pub mod stl;

use crate::config::UploadConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload rejected: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("invalid upload id: {0}")]
    InvalidId(String),
    #[error("STL file not found for upload ID: {0}")]
    NotFound(String),
    #[error("upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata returned for a stored upload
#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    pub upload_id: String,
    pub original_filename: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: PathBuf::from(&config.directory),
            max_file_size: config.max_file_size_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_directory(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.root).await?;
        debug!(path = %self.root.display(), "Upload directory ready");
        Ok(())
    }

    /// Collect every problem with a candidate upload
    pub fn validate(&self, filename: &str, bytes: &[u8]) -> Vec<String> {
        let mut errors = Vec::new();
        let extension = extension_of(filename);

        if !self.allowed_extensions.contains(&extension) {
            let shown = if extension.is_empty() { "(none)" } else { extension.as_str() };
            errors.push(format!("Unsupported file extension: {}", shown));
        }

        let size = bytes.len() as u64;
        if size == 0 {
            errors.push("Empty file uploaded".to_string());
        } else if size > self.max_file_size {
            errors.push(format!(
                "File too large: {}MB (max: {}MB)",
                size / (1024 * 1024),
                self.max_file_size / (1024 * 1024)
            ));
        } else if extension == ".stl" && !stl::looks_like_stl(bytes) {
            errors.push("File does not appear to be a valid STL".to_string());
        }

        errors
    }

    pub async fn store(
        &self,
        filename: &str,
        bytes: &[u8],
        session_id: &str,
    ) -> Result<StoredUpload, UploadError> {
        let original_filename = base_name(filename);
        let errors = self.validate(&original_filename, bytes);
        if !errors.is_empty() {
            warn!(filename = %original_filename, ?errors, "Upload failed validation");
            return Err(UploadError::Invalid(errors));
        }

        self.ensure_directory().await?;

        let stored_at = Utc::now();
        let upload_id = generate_upload_id(&original_filename, session_id, stored_at);
        let path = self.root.join(&upload_id);
        tokio::fs::write(&path, bytes).await?;

        let upload = StoredUpload {
            upload_id,
            original_filename,
            size_bytes: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(bytes)),
            stored_at,
        };

        info!(
            upload_id = %upload.upload_id,
            filename = %upload.original_filename,
            size_bytes = upload.size_bytes,
            "Upload stored"
        );
        Ok(upload)
    }

    /// Map an upload id back to its file, refusing anything outside the store
    pub async fn resolve(&self, upload_id: &str) -> Result<PathBuf, UploadError> {
        let id = upload_id.trim();
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(UploadError::InvalidId(upload_id.to_string()));
        }

        let path = self.root.join(id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(UploadError::NotFound(id.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(UploadError::NotFound(id.to_string()))
            }
            Err(e) => Err(UploadError::Io(e)),
        }
    }

    /// Delete stored files last modified more than `max_age` ago
    pub async fn cleanup_expired(&self, max_age: Duration) -> Result<usize, UploadError> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified()?;
            if modified <= cutoff {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Failed to remove expired upload"
                    ),
                }
            }
        }

        if removed > 0 {
            info!(removed, "Expired uploads cleaned up");
        }
        Ok(removed)
    }
}

/// `{YYYYmmdd_HHMMSS}_{8 hex}{ext}`
fn generate_upload_id(original_filename: &str, session_id: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.format("%Y%m%d_%H%M%S");
    let nonce = uuid::Uuid::new_v4();
    let digest = Sha256::digest(
        format!("{}_{}_{}_{}", original_filename, session_id, timestamp, nonce).as_bytes(),
    );
    let short_hash: String = format!("{:x}", digest).chars().take(8).collect();

    format!("{}_{}{}", timestamp, short_hash, extension_of(original_filename))
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim().trim_start_matches('.').to_lowercase())
}

fn base_name(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .to_string()
}
