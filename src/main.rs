// Deck Gate - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI plus the stdio and HTTP servers. All tool calls route through the
// Dispatcher.
// Usage:
//   deck-gate serve                                  # Run MCP server (stdio)
//   deck-gate http [--host H] [--port P]             # Run HTTP server
//   deck-gate tools                                  # List registered tools
//   deck-gate call <tool> <arguments>                # One-shot tool call
//   deck-gate schema <source_file> <function>        # Infer a schema from source
//   deck-gate config-export <json_file>              # Write effective config

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deck_gate::{
    config::GatewayConfig,
    dispatch::Dispatcher,
    http, mcp,
    schema::source::{infer_from_source, SourceLocation},
};
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deck-gate")]
#[command(author = "Joseph Stone")]
#[command(version)]
#[command(about = "Deck Gate - MCP tool gateway for presentation documents")]
struct Cli {
    /// JSON config file (defaults apply when missing)
    #[arg(short, long, default_value = "deck-gate.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC)
    Serve,

    /// Run HTTP server (POST /mcp/stream, GET /presentations/{name})
    Http {
        /// Bind host (overrides config and HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List registered tools with their input schemas
    Tools,

    /// One-shot tool call with storage sync
    Call {
        /// Tool name (create_presentation, add_slide, etc.)
        tool: String,

        /// Arguments as JSON object string
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Infer a tool schema from a source file
    Schema {
        /// Source file declaring the function
        source_file: PathBuf,

        /// Function name
        function: String,
    },

    /// Export effective config (file + env) to JSON file
    ConfigExport {
        /// File to write the JSON config to
        json_file: PathBuf,
    },
}

fn main() -> Result<()> {
    // stdout is reserved for protocol traffic; env_logger writes to stderr
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let cli = Cli::parse();

    let mut config = GatewayConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;
    config.apply_env();

    match cli.command {
        Commands::Serve => {
            let dispatcher = Dispatcher::from_config(config)?;
            mcp::run(dispatcher).context("stdio server failed")?;
        }

        Commands::Http { host, port } => {
            if let Some(host) = host {
                config.http.host = host;
            }
            if let Some(port) = port {
                config.http.port = port;
            }
            let (host, port) = (config.http.host.clone(), config.http.port);
            let dispatcher = Dispatcher::from_config(config)?;
            http::run(dispatcher, &host, port)?;
        }

        Commands::Tools => {
            let dispatcher = Dispatcher::from_config(config)?;
            println!("{}", serde_json::to_string_pretty(&dispatcher.list_tools())?);
        }

        Commands::Call { tool, arguments } => {
            let arguments: Map<String, Value> = serde_json::from_str(&arguments)
                .with_context(|| format!("Invalid arguments JSON: {}", arguments))?;

            let mut dispatcher = Dispatcher::from_config(config)?;
            let outcome = dispatcher.call_tool(&tool, arguments);
            // Removes the scratch directory; process::exit skips destructors
            drop(dispatcher);
            match outcome {
                Ok(result) => {
                    let text = result["content"][0]["text"].as_str().unwrap_or_default();
                    println!("{}", text);
                }
                Err(e) => {
                    eprintln!("[{}] {}", e.code(), e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Schema { source_file, function } => {
            let location = SourceLocation {
                text: None,
                file: Some(source_file),
            };
            let cwd = std::env::current_dir()?;
            let schema = infer_from_source(&function, None, &location, &cwd)?;
            if schema.is_empty() {
                log::warn!("No parameters found for {}", function);
            }
            println!("{}", serde_json::to_string_pretty(&schema.to_json())?);
        }

        Commands::ConfigExport { json_file } => {
            config.save(&json_file)
                .with_context(|| format!("Failed to write {:?}", json_file))?;
            println!("Config exported to {:?}", json_file);
        }
    }

    Ok(())
}
