// Deck Gate - Storage Adapters
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Blob store addressed by logical document name.
// Backends: local directory, HTTP object store (S3-style PUT/GET/HEAD).
// The core only ever sees the StorageAdapter capability.

use crate::config::{GatewayConfig, ObjectStoreConfig, StorageBackend};
use crate::error::{GatewayError, Result};
use crate::paths;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Presence check, download, upload, URL resolution by logical name
pub trait StorageAdapter: Send + Sync {
    fn exists(&self, name: &str) -> Result<bool>;
    fn download(&self, name: &str, dest: &Path) -> Result<()>;
    /// Upload a local file under `name`, returning its storage URL
    fn upload(&self, src: &Path, name: &str) -> Result<String>;
    fn url(&self, name: &str) -> String;
    fn backend(&self) -> &'static str;
}

/// Build the configured backend
pub fn open(config: &GatewayConfig) -> Result<Arc<dyn StorageAdapter>> {
    match config.storage.backend {
        StorageBackend::Local => {
            let storage = LocalStorage::open(&config.storage.local_dir, &config.public_base_url())?;
            Ok(Arc::new(storage))
        }
        StorageBackend::Object => Ok(Arc::new(ObjectStorage::new(&config.storage.object)?)),
    }
}

// ============================================================================
// LOCAL DIRECTORY
// ============================================================================

pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Open (or create) a storage directory
    pub fn open(root: &Path, base_url: &str) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        log::info!("Local storage at {:?}", root);
        Ok(Self {
            root: root.to_path_buf(),
            base_url: base_url.to_string(),
        })
    }

    fn object_path(&self, name: &str) -> Result<PathBuf> {
        let base = paths::basename(name)
            .ok_or_else(|| GatewayError::InvalidParams(format!("invalid document name: {:?}", name)))?;
        Ok(self.root.join(base))
    }
}

impl StorageAdapter for LocalStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.object_path(name)?.is_file())
    }

    fn download(&self, name: &str, dest: &Path) -> Result<()> {
        let src = self.object_path(name)?;
        if !src.is_file() {
            return Err(GatewayError::DocumentNotFound(name.to_string()));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&src, dest)?;
        Ok(())
    }

    fn upload(&self, src: &Path, name: &str) -> Result<String> {
        let target = self.object_path(name)?;
        // Write beside the target, then rename: readers never see a partial file
        let base = target.file_name().and_then(|n| n.to_str()).unwrap_or("document");
        let staging = self.root.join(format!(".{}.upload", base));
        std::fs::copy(src, &staging)?;
        if let Err(e) = std::fs::rename(&staging, &target) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(self.url(name))
    }

    fn url(&self, name: &str) -> String {
        paths::download_url(&self.base_url, name)
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

// ============================================================================
// HTTP OBJECT STORE
// ============================================================================

pub struct ObjectStorage {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
    public_url: Option<Url>,
}

/// Parse a base URL that object paths can be appended to
fn base_url(raw: &str, what: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| GatewayError::Storage(format!("invalid {} {:?}: {}", what, raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(GatewayError::Storage(format!("invalid {} {:?}: not a base URL", what, raw)));
    }
    Ok(url)
}

/// `base` with each segment appended, percent-encoded
fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

impl ObjectStorage {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(GatewayError::Storage(
                "object backend selected but STORAGE_ENDPOINT is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .user_agent(concat!("deck-gate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Storage(format!("HTTP client init failed: {}", e)))?;
        let endpoint = base_url(&config.endpoint, "STORAGE_ENDPOINT")?;
        let public_url = match &config.public_url {
            Some(raw) => Some(base_url(raw, "STORAGE_PUBLIC_URL")?),
            None => None,
        };
        log::info!("Object storage at {}/{}", config.endpoint, config.bucket);
        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            public_url,
        })
    }

    fn object_url(&self, name: &str) -> Url {
        with_segments(&self.endpoint, &[&self.bucket, name])
    }

    fn authorized(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn http_err(op: &str, name: &str, e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Storage(format!("{} {} failed: {}", op, name, e))
}

impl StorageAdapter for ObjectStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        let resp = self
            .authorized(self.client.head(self.object_url(name)))
            .send()
            .map_err(|e| http_err("HEAD", name, e))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(http_err("HEAD", name, s)),
        }
    }

    fn download(&self, name: &str, dest: &Path) -> Result<()> {
        let resp = self
            .authorized(self.client.get(self.object_url(name)))
            .send()
            .map_err(|e| http_err("GET", name, e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::DocumentNotFound(name.to_string()));
        }
        if !resp.status().is_success() {
            return Err(http_err("GET", name, resp.status()));
        }
        let bytes = resp.bytes().map_err(|e| http_err("GET", name, e))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes)?;
        Ok(())
    }

    fn upload(&self, src: &Path, name: &str) -> Result<String> {
        let body = std::fs::read(src)?;
        let resp = self
            .authorized(self.client.put(self.object_url(name)))
            .header(reqwest::header::CONTENT_TYPE, PPTX_MIME)
            .body(body)
            .send()
            .map_err(|e| http_err("PUT", name, e))?;
        if !resp.status().is_success() {
            return Err(http_err("PUT", name, resp.status()));
        }
        Ok(self.url(name))
    }

    fn url(&self, name: &str) -> String {
        match &self.public_url {
            Some(base) => with_segments(base, &[name]).to_string(),
            None => self.object_url(name).to_string(),
        }
    }

    fn backend(&self) -> &'static str {
        "object"
    }
}

// ============================================================================
// CHECKSUMS
// ============================================================================

/// SHA256 of a file as hex string
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_round_trip() -> anyhow::Result<()> {
        let root = tempdir()?;
        let work = tempdir()?;
        let storage = LocalStorage::open(root.path(), "http://localhost:8000")?;

        assert!(!storage.exists("deck.pptx")?);

        let src = work.path().join("src.pptx");
        std::fs::write(&src, b"deck bytes")?;
        let url = storage.upload(&src, "deck.pptx")?;
        assert_eq!(url, "http://localhost:8000/presentations/deck.pptx");
        assert!(storage.exists("deck.pptx")?);

        let dest = work.path().join("nested/out.pptx");
        storage.download("deck.pptx", &dest)?;
        assert_eq!(std::fs::read(&dest)?, b"deck bytes");
        Ok(())
    }

    #[test]
    fn local_download_missing_is_not_found() -> anyhow::Result<()> {
        let root = tempdir()?;
        let storage = LocalStorage::open(root.path(), "http://localhost")?;
        let err = storage
            .download("ghost.pptx", &root.path().join("x"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::DocumentNotFound(_)));
        Ok(())
    }

    #[test]
    fn local_upload_leaves_no_partial_file() -> anyhow::Result<()> {
        let root = tempdir()?;
        let storage = LocalStorage::open(root.path(), "http://localhost")?;
        let src = root.path().join("in.bin");
        std::fs::write(&src, b"x")?;
        storage.upload(&src, "a.pptx")?;
        assert!(!root.path().join(".a.pptx.upload").exists());
        Ok(())
    }

    #[test]
    fn object_storage_requires_endpoint() {
        let config = ObjectStoreConfig::default();
        assert!(ObjectStorage::new(&config).is_err());
    }

    #[test]
    fn object_urls_prefer_public_prefix() -> anyhow::Result<()> {
        let mut config = ObjectStoreConfig::default();
        config.endpoint = "https://store.example.com/".to_string();
        let storage = ObjectStorage::new(&config)?;
        assert_eq!(storage.url("a.pptx"), "https://store.example.com/presentations/a.pptx");

        config.public_url = Some("https://cdn.example.com/decks/".to_string());
        let storage = ObjectStorage::new(&config)?;
        assert_eq!(storage.url("a.pptx"), "https://cdn.example.com/decks/a.pptx");
        Ok(())
    }

    #[test]
    fn object_names_are_percent_encoded() -> anyhow::Result<()> {
        let mut config = ObjectStoreConfig::default();
        config.endpoint = "https://store.example.com".to_string();
        let storage = ObjectStorage::new(&config)?;

        let url = storage.object_url("Q3 #final?.pptx");
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), None);
        assert_eq!(url.path(), "/presentations/Q3%20%23final%3F.pptx");
        assert_ne!(storage.object_url("Q3 #other.pptx"), url);
        assert_eq!(storage.url("a b.pptx"), "https://store.example.com/presentations/a%20b.pptx");

        config.endpoint = "not a url".to_string();
        assert!(ObjectStorage::new(&config).is_err());
        Ok(())
    }

    #[test]
    fn sha256_matches_known_digest() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("f");
        std::fs::write(&path, b"abc")?;
        assert_eq!(
            sha256_file(&path)?,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        Ok(())
    }
}
