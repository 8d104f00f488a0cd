// Deck Gate - Tool Registry
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// name -> callable mapping, built once at startup and immutable after.
//
// Tools come from ToolHost adapters tried in configured order; the first
// adapter yielding a non-empty tool list wins:
//   builtin   - the in-crate tool catalog, declared signatures
//   manifest  - externally declared tools bound to catalog handlers as
//               opaque closures (no signature, optional wrapper layers)
//
// Each callable is unwrapped through its wrapper layers (bounded) to reach
// something introspectable, then its schema is inferred unless the entry
// carries a static one.

use crate::config::{AdapterKind, GatewayConfig};
use crate::context::ToolContext;
use crate::error::{GatewayError, Result};
use crate::schema::{self, Signature, SourceLocation};
use crate::tools::{self, Args, Capabilities, ToolFn};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================================================
// CALLABLES
// ============================================================================

/// A tool function, possibly behind decorator-style wrapper layers
pub enum Callable {
    Direct {
        func: ToolFn,
        /// None for opaque closures
        signature: Option<Signature>,
        doc: Option<String>,
        source: Option<SourceLocation>,
    },
    Wrapped {
        layer: String,
        inner: Box<Callable>,
    },
}

impl Callable {
    pub fn direct(func: ToolFn, signature: Option<Signature>, doc: Option<String>) -> Self {
        Callable::Direct { func, signature, doc, source: None }
    }

    pub fn wrap(self, layer: impl Into<String>) -> Self {
        Callable::Wrapped {
            layer: layer.into(),
            inner: Box::new(self),
        }
    }

    /// Peel wrapper layers until a Direct callable is reached. When the
    /// depth limit is hit first, the outermost callable is returned.
    pub fn unwrap_layers(&self, max_depth: usize) -> &Callable {
        let mut current = self;
        for _ in 0..max_depth {
            match current {
                Callable::Direct { .. } => return current,
                Callable::Wrapped { inner, .. } => current = inner.as_ref(),
            }
        }
        match current {
            Callable::Direct { .. } => current,
            Callable::Wrapped { layer, .. } => {
                log::warn!("Unwrap depth ({}) exhausted at layer {}, keeping outermost callable", max_depth, layer);
                self
            }
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Callable::Direct { signature, .. } => signature.as_ref(),
            Callable::Wrapped { .. } => None,
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            Callable::Direct { doc, .. } => doc.as_deref(),
            Callable::Wrapped { .. } => None,
        }
    }

    pub fn source(&self) -> Option<&SourceLocation> {
        match self {
            Callable::Direct { source, .. } => source.as_ref(),
            Callable::Wrapped { .. } => None,
        }
    }

    /// Call through every layer
    pub fn invoke(&self, ctx: &mut ToolContext<'_>, args: &Args<'_>) -> anyhow::Result<Value> {
        match self {
            Callable::Direct { func, .. } => func(ctx, args),
            Callable::Wrapped { inner, .. } => inner.invoke(ctx, args),
        }
    }
}

// ============================================================================
// HOSTS
// ============================================================================

/// One tool as a host exposes it
pub struct ToolEntry {
    pub name: String,
    pub callable: Callable,
    pub description: Option<String>,
    /// Static input schema; bypasses inference
    pub schema: Option<Value>,
    pub capabilities: Capabilities,
}

/// A source of tools
pub trait ToolHost {
    fn name(&self) -> &'static str;
    fn list_tools(&self) -> anyhow::Result<Vec<ToolEntry>>;
}

/// The in-crate catalog
pub struct BuiltinHost;

impl ToolHost for BuiltinHost {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn list_tools(&self) -> anyhow::Result<Vec<ToolEntry>> {
        Ok(tools::catalog()
            .into_iter()
            .map(|spec| ToolEntry {
                name: spec.name.to_string(),
                callable: Callable::direct(spec.func, Some(spec.signature), Some(spec.doc.to_string())),
                description: None,
                schema: None,
                capabilities: spec.capabilities,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    /// Catalog tool that implements it
    handler: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<SourceLocation>,
    #[serde(default)]
    wrappers: usize,
    #[serde(default)]
    mutating: Option<bool>,
    #[serde(default)]
    saves: Option<bool>,
    #[serde(default)]
    schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    Wrapped { tools: Vec<ManifestEntry> },
    Bare(Vec<ManifestEntry>),
}

/// Tools declared in a JSON manifest
pub struct ManifestHost {
    path: PathBuf,
}

impl ManifestHost {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    fn entry(&self, raw: ManifestEntry) -> anyhow::Result<ToolEntry> {
        let handler = tools::lookup(&raw.handler)
            .with_context(|| format!("tool {}: unknown handler {}", raw.name, raw.handler))?;

        // Relative source files are relative to the manifest
        let source = raw.source.map(|mut loc| {
            if let (Some(file), Some(dir)) = (&loc.file, self.path.parent()) {
                if file.is_relative() && dir.join(file).is_file() {
                    loc.file = Some(dir.join(file));
                }
            }
            loc
        });

        let mut callable = Callable::Direct {
            func: handler.func,
            signature: None,
            doc: raw.description.clone(),
            source,
        };
        for depth in 0..raw.wrappers {
            callable = callable.wrap(format!("{}#{}", raw.name, depth + 1));
        }

        Ok(ToolEntry {
            name: raw.name,
            callable,
            description: raw.description,
            schema: raw.schema,
            capabilities: Capabilities {
                mutating: raw.mutating.unwrap_or(handler.capabilities.mutating),
                saves: raw.saves.unwrap_or(handler.capabilities.saves),
            },
        })
    }
}

impl ToolHost for ManifestHost {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn list_tools(&self) -> anyhow::Result<Vec<ToolEntry>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read tool manifest {}", self.path.display()))?;
        let manifest: Manifest = serde_json::from_str(&content)
            .with_context(|| format!("invalid tool manifest {}", self.path.display()))?;
        let raw = match manifest {
            Manifest::Wrapped { tools } | Manifest::Bare(tools) => tools,
        };
        let mut entries = Vec::with_capacity(raw.len());
        for item in raw {
            match self.entry(item) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Skipping manifest entry: {:#}", e),
            }
        }
        Ok(entries)
    }
}

/// Hosts for the configured adapter order
pub fn hosts_for(config: &GatewayConfig) -> Vec<Box<dyn ToolHost>> {
    config
        .registry
        .adapters
        .iter()
        .filter_map(|kind| match kind {
            AdapterKind::Builtin => Some(Box::new(BuiltinHost) as Box<dyn ToolHost>),
            AdapterKind::Manifest => match &config.registry.manifest {
                Some(path) => Some(Box::new(ManifestHost::new(path)) as Box<dyn ToolHost>),
                None => {
                    log::warn!("manifest adapter configured without registry.manifest, skipped");
                    None
                }
            },
        })
        .collect()
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Tool Descriptor as listed by tools/list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Tool: {}", name),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }
}

pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub capabilities: Capabilities,
    callable: Callable,
    /// Declared non-null defaults, filled in for absent arguments
    defaults: Map<String, Value>,
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Check arguments against the input schema and fill declared defaults.
    /// A tool with an empty schema, or one taking extra keywords, accepts
    /// unknown arguments.
    pub fn bind(&self, mut args: Map<String, Value>) -> Result<Map<String, Value>> {
        let schema = &self.descriptor.input_schema;
        let open = schema.get("additionalProperties").and_then(Value::as_bool).unwrap_or(false);
        let properties = schema.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties.filter(|p| !open && !p.is_empty()) {
            if let Some(unknown) = args.keys().find(|k| !properties.contains_key(*k)) {
                return Err(GatewayError::InvalidParams(format!(
                    "{} got an unexpected argument '{}'",
                    self.name(),
                    unknown
                )));
            }
        }
        let required = schema.get("required").and_then(Value::as_array);
        for name in required.into_iter().flatten().filter_map(Value::as_str) {
            if !args.contains_key(name) {
                return Err(GatewayError::InvalidParams(format!(
                    "{} missing required argument '{}'",
                    self.name(),
                    name
                )));
            }
        }
        for (name, default) in &self.defaults {
            if !args.contains_key(name) {
                args.insert(name.clone(), default.clone());
            }
        }
        Ok(args)
    }

    pub fn invoke(&self, ctx: &mut ToolContext<'_>, args: &Map<String, Value>) -> anyhow::Result<Value> {
        self.callable.invoke(ctx, &Args::new(args))
    }
}

#[derive(Default)]
pub struct Registry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    host: Option<&'static str>,
}

impl Registry {
    /// Build from the configured adapters
    pub fn from_config(config: &GatewayConfig, cwd: &Path) -> Self {
        Self::build(&hosts_for(config), config.registry.unwrap_depth, cwd)
    }

    /// First host with a non-empty tool list wins
    pub fn build(hosts: &[Box<dyn ToolHost>], unwrap_depth: usize, cwd: &Path) -> Self {
        for host in hosts {
            match host.list_tools() {
                Ok(entries) if !entries.is_empty() => {
                    let mut registry = Self::from_entries(entries, unwrap_depth, cwd);
                    registry.host = Some(host.name());
                    log::info!("Registered {} tools from {} host", registry.len(), host.name());
                    return registry;
                }
                Ok(_) => log::info!("{} host has no tools, trying next", host.name()),
                Err(e) => log::warn!("{} host failed: {:#}", host.name(), e),
            }
        }
        log::warn!("No tool host yielded tools; listing fallback names only");
        Self::default()
    }

    pub fn from_entries(entries: Vec<ToolEntry>, unwrap_depth: usize, cwd: &Path) -> Self {
        let mut registry = Self::default();
        for entry in entries {
            if registry.index.contains_key(&entry.name) {
                log::warn!("Duplicate tool {} ignored", entry.name);
                continue;
            }
            let tool = Self::register(entry, unwrap_depth, cwd);
            registry.index.insert(tool.descriptor.name.clone(), registry.tools.len());
            registry.tools.push(tool);
        }
        registry
    }

    fn register(entry: ToolEntry, unwrap_depth: usize, cwd: &Path) -> RegisteredTool {
        let target = entry.callable.unwrap_layers(unwrap_depth);
        let doc = entry.description.as_deref().or(target.doc());

        let input_schema = match entry.schema.filter(Value::is_object) {
            Some(schema) => schema,
            None => schema::infer(&entry.name, target.signature(), doc, target.source(), cwd).to_json(),
        };

        let defaults = target
            .signature()
            .map(|sig| {
                sig.visible()
                    .iter()
                    .filter_map(|p| {
                        let default = sig.default_for(&p.name).filter(|v| !v.is_null())?;
                        Some((p.name.clone(), default.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let description = doc
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Tool: {}", entry.name));

        RegisteredTool {
            descriptor: ToolDescriptor {
                name: entry.name,
                description,
                input_schema,
            },
            capabilities: entry.capabilities,
            callable: entry.callable,
            defaults,
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Host that supplied the tools
    pub fn host(&self) -> Option<&'static str> {
        self.host
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(RegisteredTool::name).collect()
    }

    /// Descriptors in registration order. An empty registry lists the
    /// known tool names with empty schemas.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        if self.tools.is_empty() {
            return tools::names().into_iter().map(ToolDescriptor::placeholder).collect();
        }
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
