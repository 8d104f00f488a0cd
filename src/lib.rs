// Deck Gate - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.

pub mod config;
pub mod error;
pub mod paths;

// ============================================================================
// DOCUMENTS - storage, staging, in-memory decks and sessions
// ============================================================================

pub mod deck;
pub mod session;
pub mod staging;
pub mod storage;

// ============================================================================
// TOOLS - catalog, registry and schema inference
// ============================================================================

pub mod context;
pub mod registry;
pub mod schema;
pub mod tools;

// ============================================================================
// PROTOCOL - JSON-RPC dispatch and its transports
// ============================================================================

pub mod dispatch;
pub mod http;
pub mod mcp;
