use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub const MAX_IMAGES_PER_REQUEST: usize = 5;

/// Only names this store generates are ever resolved to a path.
static STORED_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.(jpg|png|gif)$")
        .expect("stored file name pattern is valid")
});

/// Product images kept on local disk and served under `/uploads/`.
pub struct ImageStore {
    dir: PathBuf,
    size_limit: usize,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, size_limit: usize) -> Self {
        Self {
            dir: dir.into(),
            size_limit,
        }
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub fn extension_for(content_type: &str) -> Option<&'static str> {
        match content_type {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            _ => None,
        }
    }

    /// Writes the image and returns its public URL.
    pub async fn save(&self, content_type: &str, data: &[u8]) -> ApiResult<String> {
        let extension = Self::extension_for(content_type).ok_or_else(|| {
            ApiError::BadRequest("Only JPG, PNG or GIF images are allowed".to_owned())
        })?;

        if data.len() > self.size_limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "Image exceeds the {} byte limit",
                self.size_limit
            )));
        }

        let file_name = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| ApiError::Internal(format!("Failed to create upload dir: {err}")))?;
        tokio::fs::write(self.dir.join(&file_name), data)
            .await
            .map_err(|err| ApiError::Internal(format!("Failed to store image: {err}")))?;

        Ok(format!("/uploads/{file_name}"))
    }

    /// Best effort: a missing or locked file is logged and skipped.
    pub async fn remove(&self, url: &str) {
        let Some(path) = url
            .strip_prefix("/uploads/")
            .and_then(|name| self.resolve(name))
        else {
            return;
        };

        if let Err(err) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %err, "Could not remove image file");
        }
    }

    pub async fn remove_all(&self, urls: &[String]) {
        for url in urls {
            self.remove(url).await;
        }
    }

    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        STORED_NAME_REGEX
            .is_match(file_name)
            .then(|| self.dir.join(file_name))
    }
}
