// Deck Gate - MCP Server (JSON-RPC 2.0 over stdio)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Newline-delimited JSON-RPC on stdin/stdout. stdout carries protocol
// messages only; all logging goes to stderr.

use crate::dispatch::Dispatcher;
use serde_json::Value;
use std::io::{self, BufRead, Write};

/// Write one response line and flush
fn send(out: &mut impl Write, response: &Value) -> io::Result<()> {
    let msg = serde_json::to_string(response)?;
    out.write_all(msg.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Serve requests from `input` until EOF, answering on `output`
pub fn serve<R: BufRead, W: Write>(dispatcher: &mut Dispatcher, input: R, mut output: W) -> io::Result<()> {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("stdin read error: {}", e);
                continue;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = dispatcher.handle_message(line) {
            send(&mut output, &response)?;
        }
    }
    Ok(())
}

/// Main MCP server loop on stdio. Returns when stdin closes.
pub fn run(mut dispatcher: Dispatcher) -> io::Result<()> {
    let config = &dispatcher.context().config;
    log::info!("Starting {} v{} (stdio)", config.server_name, config.server_version);
    log::info!(
        "{} tools, storage: {}",
        dispatcher.registry().len(),
        dispatcher.context().staging.storage().backend()
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&mut dispatcher, stdin.lock(), stdout.lock())?;
    log::info!("stdin closed, shutting down");
    Ok(())
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
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn serves_line_delimited_requests() {
        let root = tempdir().unwrap();
        let storage = LocalStorage::open(root.path(), "http://localhost:8000").unwrap();
        let ctx = GatewayContext::with_storage(GatewayConfig::default(), Arc::new(storage), root.path()).unwrap();
        let registry = Registry::from_config(&ctx.config, root.path());
        let mut dispatcher = Dispatcher::new(ctx, registry);

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "garbage\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#, "\n",
        );
        let mut output = Vec::new();
        serve(&mut dispatcher, input.as_bytes(), &mut output).unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["error"]["code"], crate::error::PARSE_ERROR);
        assert_eq!(lines[2]["result"]["tools"].as_array().unwrap().len(), 17);
    }
}
