//! Content bucket for documents and profile photos.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredObject {
    /// `<folder>/<file>` inside the bucket
    pub path: String,
    pub url: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct ContentBucket {
    root: PathBuf,
    public_url: String,
    max_bytes: usize,
}

impl ContentBucket {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>, max_bytes: usize) -> Self {
        ContentBucket {
            root: root.into(),
            public_url: public_url.into(),
            max_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.storage_dir,
            config.storage_public_url.clone(),
            config.max_upload_bytes,
        )
    }

    pub fn extension_for(content_type: &str) -> Option<&'static str> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence {
            "image/png" => Some("png"),
            "image/jpeg" => Some("jpg"),
            "image/webp" => Some("webp"),
            "application/pdf" => Some("pdf"),
            _ => None,
        }
    }

    pub fn content_type_for(file: &str) -> &'static str {
        match Path::new(file).extension().and_then(|e| e.to_str()) {
            Some("png") => "image/png",
            Some("jpg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("pdf") => "application/pdf",
            _ => "application/octet-stream",
        }
    }

    /// Folder and file names are single path segments of `[A-Za-z0-9_.-]`.
    fn check_segment(segment: &str) -> AppResult<()> {
        let valid = !segment.is_empty()
            && segment != "."
            && segment != ".."
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if valid {
            Ok(())
        } else {
            Err(AppError::validation(format!("Invalid path segment '{segment}'")))
        }
    }

    pub async fn put(&self, folder: &str, content_type: &str, bytes: &[u8]) -> AppResult<StoredObject> {
        Self::check_segment(folder)?;
        if bytes.is_empty() {
            return Err(AppError::validation("Upload is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::validation(format!(
                "Upload exceeds {} bytes",
                self.max_bytes
            )));
        }
        let ext = Self::extension_for(content_type).ok_or_else(|| {
            AppError::validation(format!("Unsupported content type '{content_type}'"))
        })?;

        let file = format!("{}.{ext}", Uuid::new_v4());
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file), bytes).await?;

        let path = format!("{folder}/{file}");
        info!(path = %path, size = bytes.len(), "Stored upload");
        Ok(StoredObject {
            url: format!("{}/{path}", self.public_url),
            path,
            size: bytes.len(),
        })
    }

    pub async fn get(&self, folder: &str, file: &str) -> AppResult<Vec<u8>> {
        Self::check_segment(folder)?;
        Self::check_segment(file)?;
        match tokio::fs::read(self.root.join(folder).join(file)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound { entity: "file" })
            }
            Err(e) => Err(e.into()),
        }
    }
}
