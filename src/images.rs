//! Filesystem image store with SQLite metadata.
//!
//! Files are written to `{root}/{category}/{label}_{timestamp}_{hash8}{ext}`
//! and described by a row in the `images` table. The public URL of an image
//! is `{public_url}/api/v1/images/file/{category}/{filename}`.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use campus_assistant_core::images::ImageStore;
use campus_assistant_core::models::{sanitize_name, Image};
use campus_assistant_core::{Error, Result};

use crate::extract::extract_pdf_images;

/// Raw image bytes read back from the store.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub struct FsImageStore {
    pool: SqlitePool,
    root: PathBuf,
    public_url: String,
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::ImageStore(e.to_string())
}

impl FsImageStore {
    pub fn new(pool: SqlitePool, root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            pool,
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, category: &str, filename: &str) -> String {
        format!(
            "{}/api/v1/images/file/{}/{}",
            self.public_url, category, filename
        )
    }

    /// Store an uploaded image.
    ///
    /// Fails with [`Error::InvalidInput`] when the bytes are not a
    /// recognizable image or the category/label is empty.
    pub async fn save(
        &self,
        bytes: &[u8],
        category: &str,
        label: &str,
        description: &str,
    ) -> Result<Image> {
        let category = sanitize_name(category);
        if category.is_empty() {
            return Err(Error::InvalidInput("category must not be empty".to_string()));
        }
        let label = label.trim();
        let label_slug = slug(label);
        if label_slug.is_empty() {
            return Err(Error::InvalidInput("label must not be empty".to_string()));
        }
        let kind = infer::get(bytes)
            .filter(|k| k.matcher_type() == infer::MatcherType::Image)
            .ok_or_else(|| Error::InvalidInput("uploaded file is not an image".to_string()))?;

        let hash = hex::encode(Sha256::digest(bytes));
        let now = Utc::now();
        let filename = format!(
            "{}_{}_{}.{}",
            label_slug,
            now.format("%Y%m%d%H%M%S"),
            &hash[..8],
            kind.extension()
        );

        let dir = self.root.join(&category);
        let path = dir.join(&filename);
        tokio::fs::create_dir_all(&dir).await.map_err(store_err)?;
        tokio::fs::write(&path, bytes).await.map_err(store_err)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO images (category, filename, label, description, content_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(category, filename) DO UPDATE SET
                label = excluded.label,
                description = excluded.description
            "#,
        )
        .bind(&category)
        .bind(&filename)
        .bind(label)
        .bind(description)
        .bind(kind.mime_type())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await;
        if let Err(e) = inserted {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %rm, "could not remove orphaned image file");
            }
            return Err(store_err(e));
        }

        tracing::info!(category = %category, filename = %filename, bytes = bytes.len(), "image stored");
        Ok(Image {
            label: label.to_string(),
            url: self.url_for(&category, &filename),
            description: description.to_string(),
            category,
        })
    }

    /// Save the images embedded in a PDF under `category`.
    ///
    /// Each image is labelled `{label_prefix}_page{n}`. Images that fail to
    /// save are logged and skipped. An unreadable PDF yields no images.
    pub async fn save_pdf_images(
        &self,
        pdf: &[u8],
        category: &str,
        label_prefix: &str,
    ) -> Vec<Image> {
        let extracted = match extract_pdf_images(pdf) {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!(error = %e, "pdf image extraction failed");
                return Vec::new();
            }
        };

        let mut saved = Vec::new();
        for image in extracted {
            let label = format!("{}_page{}", label_prefix, image.page);
            let description = format!("Page {} ({}x{})", image.page, image.width, image.height);
            match self.save(&image.bytes, category, &label, &description).await {
                Ok(stored) => saved.push(stored),
                Err(e) => tracing::warn!(page = image.page, error = %e, "pdf image not saved"),
            }
        }
        saved
    }

    /// Read an image file. `Ok(None)` when no such image is registered.
    pub async fn read(&self, category: &str, filename: &str) -> Result<Option<ImageFile>> {
        let Some(path) = self.registered_path(category, filename).await? else {
            return Ok(None);
        };
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_err(e)),
        };
        let content_type = infer::get(&bytes)
            .map(|k| k.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Some(ImageFile {
            bytes,
            content_type,
        }))
    }

    /// Remove an image file and its row. Returns `false` if it did not exist.
    pub async fn delete(&self, category: &str, filename: &str) -> Result<bool> {
        let Some(path) = self.registered_path(category, filename).await? else {
            return Ok(false);
        };
        let category = sanitize_name(category);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(store_err(e)),
        }
        sqlx::query("DELETE FROM images WHERE category = ? AND filename = ?")
            .bind(&category)
            .bind(filename)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        tracing::info!(category = %category, filename, "image deleted");
        Ok(true)
    }

    async fn registered_path(&self, category: &str, filename: &str) -> Result<Option<PathBuf>> {
        let category = sanitize_name(category);
        if !is_plain_name(&category) || !is_plain_name(filename) {
            return Err(Error::InvalidInput(format!(
                "invalid image path: {}/{}",
                category, filename
            )));
        }
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM images WHERE category = ? AND filename = ?",
        )
        .bind(&category)
        .bind(filename)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(exists.then(|| self.root.join(&category).join(filename)))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn list_by_category(&self, category: &str) -> Result<Vec<Image>> {
        let category = sanitize_name(category);
        let rows = sqlx::query(
            "SELECT filename, label, description FROM images WHERE category = ? ORDER BY created_at, rowid",
        )
        .bind(&category)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let filename: String = row.get("filename");
                Image {
                    label: row.get("label"),
                    url: self.url_for(&category, &filename),
                    description: row.get("description"),
                    category: category.clone(),
                }
            })
            .collect())
    }
}

/// Filename-safe form of a label.
fn slug(label: &str) -> String {
    let lowered: String = label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    lowered
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
