// Deck Gate - Dispatcher
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One JSON-RPC request in, one envelope out. tools/call runs:
//
//   resolve -> path-rewrite -> invoke -> post-process -> respond
//
// with an error exit from every step. Files staged for the call are
// discarded on every exit path. Upload failures after a successful
// invocation are logged and never change the response into an error.

use crate::config::GatewayConfig;
use crate::context::GatewayContext;
use crate::error::{GatewayError, Result, INVALID_REQUEST, PARSE_ERROR};
use crate::paths;
use crate::registry::{RegisteredTool, Registry};
use anyhow::Context;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

/// Tool-name fragments that allow a missing file_path to be created
const CREATION_HINTS: &[&str] = &["create", "add", "from_template"];

pub fn success(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

pub fn failure(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

/// Does this tool name imply a missing document may be created?
pub fn implies_creation(tool: &str) -> bool {
    CREATION_HINTS.iter().any(|hint| tool.contains(hint))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}…", head)
    } else {
        text.to_string()
    }
}

/// Summarize tool arguments for the call log (large values truncated)
fn param_summary(args: &Map<String, Value>) -> String {
    let path = args
        .get("file_path")
        .or_else(|| args.get("template_path"))
        .and_then(Value::as_str);
    let id = args.get("presentation_id").or_else(|| args.get("id")).and_then(Value::as_str);
    match (path, id) {
        (Some(path), Some(id)) => format!("path={} id={}", truncate(path, 120), id),
        (Some(path), None) => format!("path={}", truncate(path, 120)),
        (None, Some(id)) => format!("id={}", id),
        (None, None) => truncate(&Value::Object(args.clone()).to_string(), 300),
    }
}

/// Files staged for one tools/call
#[derive(Debug, Default)]
struct Staged {
    /// Logical name + local path of the rewritten file_path
    document: Option<(String, PathBuf)>,
    /// Logical name + local path of a template downloaded from storage
    template: Option<(String, PathBuf)>,
    /// Template resolved from a search directory (not ours to delete)
    template_local: Option<(String, PathBuf)>,
}

pub struct Dispatcher {
    ctx: GatewayContext,
    registry: Registry,
}

impl Dispatcher {
    pub fn new(ctx: GatewayContext, registry: Registry) -> Self {
        Self { ctx, registry }
    }

    /// Storage, staging, sessions and tools from configuration
    pub fn from_config(config: GatewayConfig) -> anyhow::Result<Self> {
        let ctx = GatewayContext::new(config).context("failed to initialize gateway context")?;
        let registry = Registry::from_config(&ctx.config, &ctx.cwd);
        Ok(Self::new(ctx, registry))
    }

    pub fn context(&self) -> &GatewayContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one raw message. None when no response is due.
    pub fn handle_message(&mut self, raw: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(raw) {
            Ok(msg) => self.handle(&msg),
            Err(e) => {
                log::warn!("JSON parse error: {}", e);
                Some(failure(&Value::Null, PARSE_ERROR, &format!("Parse error: {}", e)))
            }
        }
    }

    /// Handle one parsed request. Notifications get no response.
    pub fn handle(&mut self, msg: &Value) -> Option<Value> {
        let id = msg.get("id").cloned().unwrap_or(Value::Null);
        let Some(method) = msg.get("method").and_then(Value::as_str) else {
            return Some(failure(&id, INVALID_REQUEST, "Invalid request: missing method"));
        };
        log::debug!("Received: {}", method);

        if method.starts_with("notifications/") {
            return None;
        }

        let params = msg.get("params").unwrap_or(&Value::Null);
        let outcome = match method {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_from_params(params),
            other => Err(GatewayError::MethodNotFound(other.to_string())),
        };

        // A request without an id is a notification: run it, stay silent
        msg.get("id")?;
        Some(match outcome {
            Ok(result) => success(&id, result),
            Err(e) => failure(&id, e.code(), &e.to_string()),
        })
    }

    pub fn initialize(&self) -> Value {
        let config = &self.ctx.config;
        json!({
            "protocolVersion": config.protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": config.server_name,
                "version": config.server_version,
            }
        })
    }

    pub fn list_tools(&self) -> Value {
        json!({ "tools": self.registry.descriptors() })
    }

    fn call_from_params(&mut self, params: &Value) -> Result<Value> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidParams("tools/call requires a tool name".into()))?;
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(GatewayError::InvalidParams(format!(
                    "arguments must be an object, got {}",
                    other
                )))
            }
        };
        self.call_tool(name, arguments)
    }

    /// Run one tool call; Ok is the `{"content": [...]}` result
    pub fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> Result<Value> {
        log::info!("CALL {} | {}", name, param_summary(&arguments));

        let Dispatcher { ctx, registry } = self;
        let outcome = match registry.get(name) {
            Some(tool) => {
                let mut staged = Staged::default();
                let outcome = execute(ctx, registry.len(), tool, arguments, &mut staged);
                cleanup(ctx, &staged);
                outcome
            }
            None => Err(GatewayError::ToolNotFound(name.to_string())),
        };

        match outcome {
            Ok(text) => Ok(json!({ "content": [{ "type": "text", "text": text }] })),
            Err(e) => {
                log::warn!("FAIL {} | {}", name, truncate(&e.to_string(), 200));
                Err(e)
            }
        }
    }

    /// Bytes of a stored document for the serving path. The name is
    /// reduced to a logical document name first.
    pub fn read_document(&self, raw: &str) -> Result<(String, Vec<u8>)> {
        let name = paths::document_name(raw, &self.ctx.config.document_extension)
            .ok_or_else(|| GatewayError::DocumentNotFound(raw.to_string()))?;
        let staging = &self.ctx.staging;
        let outcome = staging
            .stage(&name, false)
            .and_then(|local| Ok(std::fs::read(local)?));
        if let Err(e) = staging.discard(&name) {
            log::warn!("Cleanup of {} failed: {}", name, e);
        }
        Ok((name, outcome?))
    }
}

// ============================================================================
// tools/call STEPS
// ============================================================================

fn execute(
    ctx: &mut GatewayContext,
    tool_count: usize,
    tool: &RegisteredTool,
    mut args: Map<String, Value>,
    staged: &mut Staged,
) -> Result<String> {
    rewrite_paths(ctx, tool.name(), &mut args, staged)?;

    let args = tool.bind(args)?;
    let requested_id = args.get("presentation_id").and_then(Value::as_str).map(str::to_string);

    let result = {
        let mut tool_ctx = ctx.tool_context(tool_count);
        tool.invoke(&mut tool_ctx, &args).map_err(|e| GatewayError::Invocation {
            tool: tool.name().to_string(),
            message: format!("{:#}", e),
        })?
    };

    let result = post_process(ctx, tool, requested_id, staged, result);
    Ok(render(&result))
}

/// file_path -> staged local path; template_path -> storage or search dirs
fn rewrite_paths(ctx: &GatewayContext, tool: &str, args: &mut Map<String, Value>, staged: &mut Staged) -> Result<()> {
    let extension = &ctx.config.document_extension;

    match args.get("file_path") {
        None | Some(Value::Null) => {}
        Some(Value::String(raw)) => {
            let name = paths::document_name(raw, extension)
                .ok_or_else(|| GatewayError::InvalidParams(format!("file_path {:?} has no file name", raw)))?;
            staged.document = Some((name.clone(), ctx.staging.scratch_path(&name)?));
            let local = ctx.staging.stage(&name, implies_creation(tool))?;
            args.insert("file_path".into(), json!(local.display().to_string()));
        }
        Some(other) => {
            return Err(GatewayError::InvalidParams(format!("file_path must be a string, got {}", other)));
        }
    }

    if let Some(raw) = args.get("template_path").and_then(Value::as_str) {
        let Some(name) = paths::document_name(raw, extension) else {
            return Ok(());
        };
        if let Some(local) = resolve_template(ctx, &name, staged) {
            args.insert("template_path".into(), json!(local.display().to_string()));
        }
    }
    Ok(())
}

/// Storage first, then the template search directories. None passes the
/// argument through for the tool to report.
fn resolve_template(ctx: &GatewayContext, name: &str, staged: &mut Staged) -> Option<PathBuf> {
    match ctx.staging.stage_template(name) {
        Ok(Some(local)) => {
            staged.template = Some((name.to_string(), local.clone()));
            return Some(local);
        }
        Ok(None) => {}
        Err(e) => log::warn!("Template lookup in storage failed for {}: {}", name, e),
    }
    let local = paths::find_in_dirs(name, &ctx.template_dirs)?;
    staged.template_local = Some((name.to_string(), local.clone()));
    Some(local)
}

fn is_soft_error(result: &Value) -> bool {
    result.get("error").is_some()
}

fn post_process(
    ctx: &mut GatewayContext,
    tool: &RegisteredTool,
    requested_id: Option<String>,
    staged: &Staged,
    mut result: Value,
) -> Value {
    scrub_paths(&mut result, staged);
    if is_soft_error(&result) {
        return result;
    }

    let result_id = result.get("presentation_id").and_then(Value::as_str).map(str::to_string);
    let session = result_id
        .clone()
        .or(requested_id)
        .or_else(|| ctx.sessions.current().map(str::to_string))
        .filter(|id| ctx.sessions.contains(id));

    // Bind the session to the document named in this call
    if let (Some(id), Some((name, _))) = (&result_id, &staged.document) {
        ctx.sessions.bind_filename(id, name);
    }

    if tool.capabilities.mutating {
        if let Some(id) = &session {
            ctx.sessions.mark_dirty(id);
        }
    }

    let written = staged
        .document
        .as_ref()
        .filter(|(_, local)| local.is_file())
        .map(|(name, local)| (name.clone(), local.clone()));

    // Explicit save
    if tool.capabilities.saves {
        if let Some((name, local)) = &written {
            if commit(ctx, local, name, &mut result) {
                if let Some(id) = &session {
                    ctx.sessions.mark_clean(id);
                }
            }
        }
        return result;
    }

    // Auto-save a dirty session to its bound file, unless this call's own
    // file_path upload below already covers that name
    if tool.capabilities.mutating {
        if let Some(id) = &session {
            let bound = ctx.sessions.bound_filename(id).map(str::to_string);
            if let Some(bound) = bound {
                let covered = written.as_ref().map(|(name, _)| name == &bound).unwrap_or(false);
                if !covered {
                    match auto_save(ctx, id, &bound) {
                        Ok(()) => attach_download(ctx, &mut result, &bound),
                        Err(e) => log::warn!("Auto-save of {} to {} failed: {}", id, bound, e),
                    }
                }
            }
        }
    }

    // The call's own document, mutated or not
    if let Some((name, local)) = &written {
        if commit(ctx, local, name, &mut result) {
            if let Some(id) = &session {
                if ctx.sessions.bound_filename(id) == Some(name.as_str()) {
                    ctx.sessions.mark_clean(id);
                }
            }
        }
    }
    result
}

/// Upload and attach the download URL. False (logged) on failure.
fn commit(ctx: &GatewayContext, local: &std::path::Path, name: &str, result: &mut Value) -> bool {
    match ctx.staging.commit(local, name) {
        Ok(_) => {
            attach_download(ctx, result, name);
            true
        }
        Err(e) => {
            log::warn!("Upload of {} failed: {}", name, e);
            false
        }
    }
}

/// Serialize the session's deck to a fresh scratch file and upload it
fn auto_save(ctx: &mut GatewayContext, id: &str, name: &str) -> Result<()> {
    let scratch = ctx.staging.scratch_file(&ctx.config.document_extension)?;
    let session = ctx
        .sessions
        .get(id)
        .ok_or_else(|| GatewayError::DocumentNotFound(id.to_string()))?;
    session
        .deck
        .save(scratch.path())
        .map_err(|e| GatewayError::Storage(format!("{:#}", e)))?;
    ctx.staging.commit(scratch.path(), name)?;
    ctx.sessions.mark_clean(id);
    log::info!("Auto-saved {} to {}", id, name);
    Ok(())
}

fn attach_download(ctx: &GatewayContext, result: &mut Value, name: &str) {
    let url = paths::download_url(&ctx.config.public_base_url(), name);
    let note = format!("\n\nPresentation saved: {}\nDownload URL: {}", name, url);
    match result {
        Value::Object(map) => {
            if let Some(Value::String(message)) = map.get_mut("message") {
                message.push_str(&note);
            }
            map.insert("download_url".into(), json!(url));
        }
        Value::String(text) => text.push_str(&note),
        _ => {}
    }
}

/// Replace staged local paths in result strings with logical names
fn scrub_paths(result: &mut Value, staged: &Staged) {
    let replacements: Vec<(String, &str)> = [&staged.document, &staged.template, &staged.template_local]
        .into_iter()
        .flatten()
        .map(|(name, local)| (local.display().to_string(), name.as_str()))
        .collect();
    if !replacements.is_empty() {
        scrub_value(result, &replacements);
    }
}

fn scrub_value(value: &mut Value, replacements: &[(String, &str)]) {
    match value {
        Value::String(text) => {
            for (local, name) in replacements {
                if text.contains(local.as_str()) {
                    *text = text.replace(local.as_str(), name);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| scrub_value(v, replacements)),
        Value::Object(map) => map.values_mut().for_each(|v| scrub_value(v, replacements)),
        _ => {}
    }
}

fn render(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Remove everything staged for the call
fn cleanup(ctx: &GatewayContext, staged: &Staged) {
    if let Some((name, _)) = &staged.document {
        if let Err(e) = ctx.staging.discard(name) {
            log::warn!("Cleanup of {} failed: {}", name, e);
        }
    }
    if let Some((name, _)) = &staged.template {
        if let Err(e) = ctx.staging.discard_template(name) {
            log::warn!("Cleanup of template {} failed: {}", name, e);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStorage, StorageAdapter};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn dispatcher() -> (Dispatcher, TempDir) {
        let root = tempdir().unwrap();
        let storage = LocalStorage::open(&root.path().join("store"), "http://gate.test").unwrap();
        let mut config = GatewayConfig::default();
        config.base_url = Some("http://gate.test".into());
        config.templates.mounts.clear();
        let ctx = GatewayContext::with_storage(config, Arc::new(storage), root.path()).unwrap();
        let registry = Registry::from_config(&ctx.config, root.path());
        (Dispatcher::new(ctx, registry), root)
    }

    fn call(d: &mut Dispatcher, name: &str, args: Value) -> Value {
        d.handle(&json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": { "name": name, "arguments": args }
        }))
        .unwrap()
    }

    fn text(response: &Value) -> Value {
        let raw = response["result"]["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn creation_heuristic() {
        assert!(implies_creation("create_presentation"));
        assert!(implies_creation("add_slide"));
        assert!(implies_creation("create_presentation_from_template"));
        assert!(!implies_creation("open_presentation"));
        assert!(!implies_creation("save_presentation"));
    }

    #[test]
    fn initialize_ping_and_notifications() {
        let (mut d, _root) = dispatcher();
        let init = d.handle(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})).unwrap();
        assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(init["result"]["serverInfo"]["name"], "office-powerpoint-mcp-server");

        let ping = d.handle(&json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).unwrap();
        assert_eq!(ping["result"], json!({}));

        assert!(d.handle(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).is_none());
        assert!(d.handle(&json!({"jsonrpc": "2.0", "method": "tools/list"})).is_none());
    }

    #[test]
    fn parse_and_method_errors() {
        let (mut d, _root) = dispatcher();
        let bad = d.handle_message("{not json").unwrap();
        assert_eq!(bad["error"]["code"], PARSE_ERROR);

        let unknown = d.handle(&json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"})).unwrap();
        assert_eq!(unknown["error"]["code"], -32601);
        assert_eq!(unknown["id"], 3);

        let missing = d.handle(&json!({"jsonrpc": "2.0", "id": 4})).unwrap();
        assert_eq!(missing["error"]["code"], INVALID_REQUEST);
    }

    #[test]
    fn save_uploads_and_appends_download_url() {
        let (mut d, root) = dispatcher();
        let created = call(&mut d, "create_presentation", json!({"id": "deck1", "file_path": "talk"}));
        let created = text(&created);
        assert_eq!(created["file_path"], "talk.pptx");
        assert_eq!(created["download_url"], "http://gate.test/presentations/talk.pptx");
        assert!(root.path().join("store/talk.pptx").is_file());
        assert!(!d.context().sessions.is_dirty("deck1"));

        call(&mut d, "add_slide", json!({"title": "Agenda"}));
        let saved = text(&call(&mut d, "save_presentation", json!({"file_path": "talk.pptx"})));
        assert!(saved["message"].as_str().unwrap().contains("Presentation saved to talk.pptx"));
        assert!(saved["message"].as_str().unwrap().contains("Download URL: http://gate.test/presentations/talk.pptx"));
        assert!(!saved.to_string().contains(&d.context().staging.scratch_dir().display().to_string()));
    }

    #[test]
    fn mutating_call_autosaves_bound_session() {
        let (mut d, root) = dispatcher();
        call(&mut d, "create_presentation", json!({"id": "deck1", "file_path": "auto.pptx"}));
        let before = std::fs::read_to_string(root.path().join("store/auto.pptx")).unwrap();

        let added = text(&call(&mut d, "add_slide", json!({"title": "Later"})));
        assert_eq!(added["download_url"], "http://gate.test/presentations/auto.pptx");
        let after = std::fs::read_to_string(root.path().join("store/auto.pptx")).unwrap();
        assert_ne!(before, after);
        assert!(after.contains("Later"));
        assert!(!d.context().sessions.is_dirty("deck1"));
    }

    #[test]
    fn unbound_mutation_stays_dirty() {
        let (mut d, _root) = dispatcher();
        call(&mut d, "create_presentation", json!({"id": "loose"}));
        let added = text(&call(&mut d, "add_slide", json!({})));
        assert!(added.get("download_url").is_none());
        assert!(d.context().sessions.is_dirty("loose"));
    }

    /// Reads from a local directory, refuses every upload
    struct ReadOnlyStorage(LocalStorage);

    impl StorageAdapter for ReadOnlyStorage {
        fn exists(&self, name: &str) -> Result<bool> {
            self.0.exists(name)
        }
        fn download(&self, name: &str, dest: &std::path::Path) -> Result<()> {
            self.0.download(name, dest)
        }
        fn upload(&self, _src: &std::path::Path, name: &str) -> Result<String> {
            Err(GatewayError::Storage(format!("PUT {} failed: 503", name)))
        }
        fn url(&self, name: &str) -> String {
            self.0.url(name)
        }
        fn backend(&self) -> &'static str {
            "read-only"
        }
    }

    #[test]
    fn upload_failures_never_fail_the_call() {
        let root = tempdir().unwrap();
        let store = root.path().join("store");
        let local = LocalStorage::open(&store, "http://gate.test").unwrap();
        crate::deck::Deck::new().save(&store.join("frozen.pptx")).unwrap();
        let mut config = GatewayConfig::default();
        config.templates.mounts.clear();
        let ctx = GatewayContext::with_storage(config, Arc::new(ReadOnlyStorage(local)), root.path()).unwrap();
        let registry = Registry::from_config(&ctx.config, root.path());
        let mut d = Dispatcher::new(ctx, registry);

        let opened = call(&mut d, "open_presentation", json!({"id": "f", "file_path": "frozen.pptx"}));
        assert!(text(&opened).get("download_url").is_none());

        // Auto-save to the bound name fails
        let added = call(&mut d, "add_slide", json!({"title": "Kept in memory"}));
        assert!(added.get("error").is_none());
        assert!(text(&added).get("download_url").is_none());
        assert!(d.context().sessions.is_dirty("f"));

        // Explicit save fails at upload
        let saved = call(&mut d, "save_presentation", json!({"file_path": "frozen.pptx"}));
        assert!(saved.get("error").is_none());
        let saved = text(&saved);
        assert!(saved.get("download_url").is_none());
        assert!(!saved["message"].as_str().unwrap().contains("Download URL"));
        assert!(d.context().sessions.is_dirty("f"));
        assert!(!d.context().staging.scratch_dir().join("frozen.pptx").exists());
    }

    #[test]
    fn dropping_dispatcher_removes_scratch_dir() {
        let (mut d, _root) = dispatcher();
        let failed = call(&mut d, "not_a_tool", json!({}));
        assert_eq!(failed["error"]["code"], -32601);
        let scratch = d.context().staging.scratch_dir().to_path_buf();
        assert!(scratch.is_dir());
        drop(d);
        assert!(!scratch.exists());
    }

    #[test]
    fn soft_errors_skip_post_processing() {
        let (mut d, _root) = dispatcher();
        let result = text(&call(&mut d, "get_presentation_info", json!({})));
        assert_eq!(result["error"], crate::tools::NO_PRESENTATION);
    }

    #[test]
    fn invocation_errors_are_internal() {
        let (mut d, _root) = dispatcher();
        call(&mut d, "create_presentation", json!({"id": "d"}));
        let response = call(&mut d, "get_slide_info", json!({"slide_index": 5}));
        assert_eq!(response["error"]["code"], -32603);
        let message = response["error"]["message"].as_str().unwrap();
        assert!(message.starts_with("Error calling tool get_slide_info:"));
    }

    #[test]
    fn template_from_storage_is_staged_and_cleaned() {
        let (mut d, root) = dispatcher();
        let mut template = crate::deck::Deck::new();
        template.add_slide(0).unwrap();
        template.save(&root.path().join("store/brand.pptx")).unwrap();

        let result = text(&call(&mut d, "create_presentation_from_template", json!({"template_path": "brand"})));
        assert_eq!(result["template_path"], "brand.pptx");
        assert_eq!(result["slide_count"], 1);
        assert!(!d.context().staging.scratch_dir().join("templates/brand.pptx").exists());
    }

    #[test]
    fn read_document_sanitizes_name() {
        let (mut d, _root) = dispatcher();
        call(&mut d, "create_presentation", json!({"file_path": "served.pptx"}));
        let (name, bytes) = d.read_document("../../etc/served").unwrap();
        assert_eq!(name, "served.pptx");
        assert!(!bytes.is_empty());
        let err = d.read_document("nope.pptx").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn param_summary_prefers_paths() {
        let mut args = Map::new();
        args.insert("file_path".into(), json!("a.pptx"));
        args.insert("presentation_id".into(), json!("p"));
        assert_eq!(param_summary(&args), "path=a.pptx id=p");
        let mut other = Map::new();
        other.insert("text".into(), json!("x".repeat(400)));
        assert!(param_summary(&other).ends_with('…'));
    }
}
