//! Object storage and the media key layout.
//!
//! Every key is `<prefix>/<category>/<subcategory>/<slug>/<uuid>.<ext>`. The prefix
//! lives only in [`MediaLayout`]; writers build keys through it and readers turn keys
//! into URLs through it, so the two sides cannot drift apart.

mod local;
mod s3;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Browser cache lifetime applied to stored media.
pub const CACHE_CONTROL: &str = "max-age=86400";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &MediaKey, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, key: &MediaKey) -> Result<Vec<u8>, StorageError>;
}

/// A complete object key, prefix included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MediaKey(String);

impl MediaKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// File name portion of the key.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLayout {
    prefix: String,
    public_domain: String,
}

impl MediaLayout {
    pub fn new(prefix: &str, public_domain: &str) -> Self {
        let domain = public_domain
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            public_domain: domain.to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.media_prefix, &config.public_domain)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn public_domain(&self) -> &str {
        &self.public_domain
    }

    /// Builds the key an object is written under.
    pub fn key(
        &self,
        category: &str,
        subcategory: &str,
        slug_source: &str,
        id: Uuid,
        extension: &str,
    ) -> Result<MediaKey, StorageError> {
        let slug = slugify(slug_source);
        for (name, segment) in [("category", category), ("subcategory", subcategory), ("slug", slug.as_str())] {
            if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
                return Err(StorageError::InvalidKey(format!("bad {name} segment: {segment:?}")));
            }
        }
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidKey(format!("bad extension: {extension:?}")));
        }

        Ok(MediaKey(format!(
            "{}/{}/{}/{}/{}.{}",
            self.prefix, category, subcategory, slug, id, extension
        )))
    }

    /// Public URL the CDN serves the key at.
    pub fn public_url(&self, key: &MediaKey) -> String {
        format!("https://{}/{}", self.public_domain, key.as_str())
    }

    /// Normalises a stored path into a key.
    ///
    /// Accepts a proper key, a key missing the prefix, or an absolute URL on the
    /// public domain or an S3 endpoint.
    pub fn resolve_stored(&self, stored: &str) -> Result<MediaKey, StorageError> {
        let stored = stored.trim();
        let path = match stored
            .strip_prefix("https://")
            .or_else(|| stored.strip_prefix("http://"))
        {
            Some(rest) => {
                let (host, path) = rest
                    .split_once('/')
                    .ok_or_else(|| StorageError::InvalidKey(format!("URL has no path: {stored}")))?;
                if host != self.public_domain && !host.ends_with(".amazonaws.com") {
                    return Err(StorageError::InvalidKey(format!("unknown media host: {host}")));
                }
                path
            }
            None => stored,
        };

        let path = path.split(['?', '#']).next().unwrap_or_default().trim_matches('/');
        if path.is_empty() || path.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(StorageError::InvalidKey(format!("bad stored path: {stored}")));
        }

        let with_prefix = format!("{}/", self.prefix);
        if path.starts_with(&with_prefix) {
            Ok(MediaKey(path.to_string()))
        } else {
            Ok(MediaKey(format!("{}{}", with_prefix, path)))
        }
    }
}

/// Lowercase ASCII slug; runs of anything else collapse to one dash.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
