// Deck Gate - HTTP Boundary
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Thin axum front for the Dispatcher:
//   POST /mcp/stream              JSON-RPC request -> envelope
//   GET  /mcp/stream, /mcp/tools  tool discovery (tools/list)
//   GET  /presentations/{name}    stored document bytes
//   GET  /health                  liveness
//
// The core is synchronous. Every request takes the dispatcher lock on a
// blocking thread, so tool calls never overlap.

use crate::dispatch::Dispatcher;
use crate::storage::PPTX_MIME;
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Mutex<Dispatcher>>,
}

type HttpError = (StatusCode, String);

/// Run `f` against the dispatcher on a blocking thread
async fn with_dispatcher<T, F>(state: &AppState, f: F) -> Result<T, HttpError>
where
    F: FnOnce(&mut Dispatcher) -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatcher = state.dispatcher.clone();
    tokio::task::spawn_blocking(move || {
        let mut guard = dispatcher.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)))
}

/// POST /mcp/stream - dispatch one JSON-RPC request
async fn post_stream(State(state): State<AppState>, body: Bytes) -> Response {
    let msg: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e)).into_response(),
    };
    match with_dispatcher(&state, move |d| d.handle(&msg)).await {
        Ok(Some(response)) => Json(response).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /mcp/stream, /mcp/tools - tool discovery
async fn list_tools(State(state): State<AppState>) -> Response {
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {}});
    match with_dispatcher(&state, move |d| d.handle(&request)).await {
        Ok(Some(response)) => Json(response).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /presentations/{filename} - stream a stored document
async fn get_presentation(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let requested = filename.clone();
    let outcome = with_dispatcher(&state, move |d| d.read_document(&filename)).await;
    match outcome {
        Ok(Ok((name, bytes))) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, PPTX_MIME.to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", name)),
            ],
            bytes,
        )
            .into_response(),
        Ok(Err(e)) if e.is_not_found() => {
            (StatusCode::NOT_FOUND, format!("Presentation '{}' not found", requested)).into_response()
        }
        Ok(Err(e)) => {
            log::error!("Serving {} failed: {}", requested, e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error serving presentation: {}", e)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /health - Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Create the HTTP router
pub fn create_router(dispatcher: Arc<Mutex<Dispatcher>>) -> Router {
    let state = AppState { dispatcher };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/mcp/stream", get(list_tools).post(post_stream))
        .route("/mcp/tools", get(list_tools))
        .route("/presentations/{filename}", get(get_presentation))
        .layer(cors)
        .with_state(state)
}

/// Serve until ctrl-c
pub async fn serve(dispatcher: Arc<Mutex<Dispatcher>>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(dispatcher);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    log::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutdown requested");
        })
        .await?;
    Ok(())
}

/// Blocking entry point. The dispatcher (and any blocking HTTP client its
/// storage holds) is created and dropped outside the async runtime.
pub fn run(dispatcher: Dispatcher, host: &str, port: u16) -> anyhow::Result<()> {
    let shared = Arc::new(Mutex::new(dispatcher));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let outcome = runtime.block_on(serve(shared.clone(), host, port));
    drop(runtime);
    drop(shared);
    outcome
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::context::GatewayContext;
    use crate::registry::Registry;
    use crate::storage::LocalStorage;
    use tempfile::{tempdir, TempDir};

    fn state() -> (AppState, TempDir) {
        let root = tempdir().unwrap();
        let storage = LocalStorage::open(&root.path().join("store"), "http://localhost:8000").unwrap();
        let ctx = GatewayContext::with_storage(GatewayConfig::default(), Arc::new(storage), root.path()).unwrap();
        let registry = Registry::from_config(&ctx.config, root.path());
        let dispatcher = Dispatcher::new(ctx, registry);
        (AppState { dispatcher: Arc::new(Mutex::new(dispatcher)) }, root)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let (state, _root) = state();
        let response = post_stream(State(state), Bytes::from_static(b"{oops")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_dispatches_and_notifications_are_accepted() {
        let (state, _root) = state();
        let body = br#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"not_a_tool","arguments":{}}}"#;
        let response = post_stream(State(state.clone()), Bytes::from_static(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let envelope = body_json(response).await;
        assert_eq!(envelope["id"], 9);
        assert_eq!(envelope["error"]["code"], -32601);

        let note = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let response = post_stream(State(state), Bytes::from_static(note)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn discovery_lists_tools() {
        let (state, _root) = state();
        let envelope = body_json(list_tools(State(state)).await).await;
        assert_eq!(envelope["result"]["tools"][0]["name"], "create_presentation");
    }

    #[tokio::test]
    async fn serves_stored_documents_by_logical_name() {
        let (state, root) = state();
        std::fs::write(root.path().join("store/deck.pptx"), b"{\"layouts\":[]}").unwrap();

        let response = get_presentation(State(state.clone()), Path("deck".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], PPTX_MIME);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"deck.pptx\""
        );

        let missing = get_presentation(State(state), Path("../secret".to_string())).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health_check().await.0, json!({"status": "ok"}));
    }
}
