// Deck Gate - Session Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// List, switch and close open presentations; server metadata.

use super::{no_presentation, Args};
use crate::context::ToolContext;
use anyhow::Result;
use serde_json::{json, Value};

pub const LIST_DOC: &str = "List all open presentations.";

pub const SWITCH_DOC: &str = "Switch the current presentation.

Args:
    presentation_id: Presentation to make current
";

pub const CLOSE_DOC: &str = "Close an open presentation, releasing its session. Unsaved changes are lost.

Args:
    presentation_id: Presentation to close (defaults to the current one)
";

pub const SERVER_INFO_DOC: &str = "Get information about the server and its open presentations.";

pub fn list_presentations(ctx: &mut ToolContext<'_>, _args: &Args<'_>) -> Result<Value> {
    let rows = ctx.sessions.summaries();
    Ok(json!({
        "presentations": rows,
        "total_presentations": rows.len(),
        "current_presentation_id": ctx.sessions.current(),
    }))
}

pub fn switch_presentation(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let id = args.str("presentation_id")?;
    let previous = ctx.sessions.current().map(str::to_string);
    if !ctx.sessions.set_current(&id) {
        return Ok(json!({ "error": format!("Presentation with ID '{}' not found", id) }));
    }
    Ok(json!({
        "message": format!("Switched to presentation: {}", id),
        "previous_presentation_id": previous,
        "current_presentation_id": id,
    }))
}

pub fn close_presentation(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let dirty = ctx.sessions.is_dirty(&id);
    let file = ctx.sessions.bound_filename(&id).map(str::to_string);
    ctx.sessions.remove(&id);
    Ok(json!({
        "message": format!("Closed presentation: {}", id),
        "closed_presentation_id": id,
        "file": file,
        "had_unsaved_changes": dirty,
    }))
}

pub fn get_server_info(ctx: &mut ToolContext<'_>, _args: &Args<'_>) -> Result<Value> {
    Ok(json!({
        "name": ctx.config.server_name,
        "version": ctx.config.server_version,
        "protocol_version": ctx.config.protocol_version,
        "presentations_loaded": ctx.sessions.len(),
        "current_presentation_id": ctx.sessions.current(),
        "tool_count": ctx.tool_count,
        "storage_backend": ctx.config.storage.backend,
        "document_extension": ctx.config.document_extension,
    }))
}

// ============================================================================
// TESTS
// ============================================================================
