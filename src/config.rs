// Deck Gate - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Loads gateway settings: storage backend, template search, registry
// adapters, session capacity, HTTP bind. Defaults -> JSON file -> env.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Master gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: String,
    /// Extension forced onto every logical document name
    pub document_extension: String,
    /// Public base for download URLs. None -> http://<host>:<port>
    pub base_url: Option<String>,
    pub storage: StorageConfig,
    pub templates: TemplateConfig,
    pub registry: RegistryConfig,
    pub sessions: SessionConfig,
    pub http: HttpConfig,
    /// Prefix of the per-process scratch directory
    pub scratch_prefix: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_dir: PathBuf,
    pub object: ObjectStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub token: Option<String>,
    /// Public URL prefix for stored objects, if different from endpoint/bucket
    pub public_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Operator-configured template directory (PPT_TEMPLATE_PATH)
    pub env_path: Option<PathBuf>,
    /// Conventional mount points searched after env_path
    pub mounts: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Builtin,
    Manifest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Tool host adapters, tried in order. First non-empty wins.
    pub adapters: Vec<AdapterKind>,
    /// Tool manifest consumed by the manifest adapter
    pub manifest: Option<PathBuf>,
    /// Max wrapper layers peeled off a callable before giving up
    pub unwrap_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Open sessions kept before the least recently used one is evicted
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_name: "office-powerpoint-mcp-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: "2024-11-05".to_string(),
            document_extension: ".pptx".to_string(),
            base_url: None,
            storage: StorageConfig::default(),
            templates: TemplateConfig::default(),
            registry: RegistryConfig::default(),
            sessions: SessionConfig::default(),
            http: HttpConfig::default(),
            scratch_prefix: "ppt_edit_".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_dir: PathBuf::from("./presentations"),
            object: ObjectStoreConfig::default(),
        }
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: "presentations".to_string(),
            token: None,
            public_url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            env_path: None,
            mounts: vec![PathBuf::from("/app/templates"), PathBuf::from("/mnt/templates")],
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            adapters: vec![AdapterKind::Builtin],
            manifest: None,
            unwrap_depth: 8,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_sessions: 64 }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl GatewayConfig {
    /// Load config from JSON file, falling back to defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            log::warn!("Config not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply process environment overrides
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the process env in production)
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("PRESENTATIONS_DIR") {
            self.storage.local_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("BASE_URL").or_else(|| get("RENDER_SERVICE_URL")) {
            self.base_url = Some(url);
        }
        if let Some(path) = get("PPT_TEMPLATE_PATH") {
            self.templates.env_path = Some(PathBuf::from(path));
        }
        if let Some(host) = get("HOST") {
            self.http.host = host;
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(p) => self.http.port = p,
                Err(_) => log::warn!("Ignoring invalid PORT {:?}", port),
            }
        }
        if let Some(backend) = get("STORAGE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "local" => self.storage.backend = StorageBackend::Local,
                "object" | "cloud" | "s3" => self.storage.backend = StorageBackend::Object,
                other => log::warn!("Ignoring unknown STORAGE_BACKEND {:?}", other),
            }
        }
        if let Some(endpoint) = get("STORAGE_ENDPOINT") {
            self.storage.object.endpoint = endpoint;
        }
        if let Some(bucket) = get("STORAGE_BUCKET") {
            self.storage.object.bucket = bucket;
        }
        if let Some(token) = get("STORAGE_TOKEN") {
            self.storage.object.token = Some(token);
        }
        if let Some(public) = get("STORAGE_PUBLIC_URL") {
            self.storage.object.public_url = Some(public);
        }
    }

    /// Base URL used when building download links
    pub fn public_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.http.host, self.http.port),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
