// Deck Gate - Presentation Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Create, open, save and describe presentations.

use super::{no_presentation, Args};
use crate::context::ToolContext;
use crate::deck::Deck;
use anyhow::Result;
use serde_json::{json, Map, Value};
use std::path::Path;

pub const CREATE_DOC: &str = "Create a new PowerPoint presentation.

Args:
    id: Optional presentation identifier (auto-generated when omitted)
    file_path: Optional path to immediately save the presentation
    title: Optional title text for the first slide
    subtitle: Optional subtitle text for the first slide
    slide_layout_index: Slide layout to use when creating a title slide
    set_as_current: Whether to mark the created presentation as current
    auto_save: Save to file_path (when provided) before returning
";

pub const FROM_TEMPLATE_DOC: &str = "Create a new PowerPoint presentation from a template file.

Args:
    template_path: Template file name or path
    id: Optional presentation identifier (auto-generated when omitted)
";

pub const OPEN_DOC: &str = "Open an existing PowerPoint presentation from a file.

Args:
    file_path: Presentation file to open
    id: Optional presentation identifier (auto-generated when omitted)
";

pub const SAVE_DOC: &str = "Save a presentation to a file.

Args:
    file_path: Destination file name
    presentation_id: Presentation to save (defaults to the current one)
";

pub const INFO_DOC: &str = "Get information about a presentation.

Args:
    presentation_id: Presentation to describe (defaults to the current one)
";

pub const TEMPLATE_INFO_DOC: &str = "Get information about a template file including layouts and properties.

Args:
    template_path: Template file name or path
";

pub const CORE_PROPERTIES_DOC: &str = "Set core document properties.

Args:
    title: Document title
    subject: Document subject
    author: Document author
    keywords: Comma-separated keywords
    comments: Free-form comments
    presentation_id: Presentation to update (defaults to the current one)
";

fn template_not_found(ctx: &ToolContext<'_>, template_path: &str) -> Value {
    let searched: Vec<String> = ctx.template_dirs.iter().map(|d| d.display().to_string()).collect();
    let env_info = ctx
        .config
        .templates
        .env_path
        .as_ref()
        .map(|p| format!(" (PPT_TEMPLATE_PATH: {})", p.display()))
        .unwrap_or_default();
    json!({
        "error": format!(
            "Template file not found: {}. Searched in {}{}",
            template_path,
            searched.join(", "),
            env_info
        )
    })
}

pub fn create_presentation(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let file_path = args.opt_str("file_path")?;
    let title = args.opt_str("title")?.filter(|t| !t.is_empty());
    let subtitle = args.opt_str("subtitle")?.filter(|s| !s.is_empty());
    let layout_index = args.index_or("slide_layout_index", 0)?;
    let set_as_current = args.bool_or("set_as_current", true)?;
    let auto_save = args.bool_or("auto_save", true)?;

    let mut deck = Deck::new();
    let mut title_applied = false;
    let mut subtitle_applied = false;
    if title.is_some() || subtitle.is_some() {
        match deck.add_slide(layout_index) {
            Ok(slide) => {
                if let Some(title) = &title {
                    title_applied = deck.set_title(slide, title).is_ok();
                }
                if let Some(subtitle) = &subtitle {
                    subtitle_applied = deck.populate_placeholder(slide, 1, subtitle).is_ok();
                }
            }
            Err(e) => log::debug!("Title slide skipped: {:#}", e),
        }
    }

    let mut saved_path = None;
    let mut save_error = None;
    if let (true, Some(path)) = (auto_save, &file_path) {
        match deck.save(Path::new(path)) {
            Ok(written) => saved_path = Some(written),
            Err(e) => save_error = Some(format!("{:#}", e)),
        }
    }

    let slide_count = deck.slides.len();
    let id = args.opt_str("id")?;
    let id = ctx.sessions.insert(id, deck);
    if set_as_current {
        ctx.sessions.set_current(&id);
    }

    let mut result = Map::new();
    result.insert("presentation_id".into(), json!(id));
    result.insert("message".into(), json!(format!("Created new presentation with ID: {}", id)));
    result.insert("slide_count".into(), json!(slide_count));
    result.insert("title_applied".into(), json!(title_applied));
    result.insert("subtitle_applied".into(), json!(subtitle_applied));
    match saved_path {
        Some(path) => {
            result.insert("file_path".into(), json!(path));
            result.insert("saved".into(), json!(true));
        }
        None => {
            result.insert("saved".into(), json!(false));
        }
    }
    if let Some(err) = save_error {
        result.insert("save_error".into(), json!(err));
    }
    if let Some(title) = title {
        result.insert("title".into(), json!(title));
    }
    if let Some(subtitle) = subtitle {
        result.insert("subtitle".into(), json!(subtitle));
    }
    Ok(Value::Object(result))
}

pub fn create_presentation_from_template(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let template_path = args.str("template_path")?;
    let Some(resolved) = ctx.find_template(&template_path) else {
        return Ok(template_not_found(ctx, &template_path));
    };

    let deck = match Deck::from_template(&resolved) {
        Ok(deck) => deck,
        Err(e) => {
            return Ok(json!({
                "error": format!("Failed to create presentation from template: {:#}", e)
            }))
        }
    };
    let slide_count = deck.slides.len();
    let layout_count = deck.layouts.len();
    let id = ctx.sessions.insert(args.opt_str("id")?, deck);
    ctx.sessions.set_current(&id);

    let resolved = resolved.display().to_string();
    Ok(json!({
        "presentation_id": id,
        "message": format!("Created new presentation from template '{}' with ID: {}", resolved, id),
        "template_path": resolved,
        "slide_count": slide_count,
        "layout_count": layout_count,
    }))
}

pub fn open_presentation(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let file_path = args.str("file_path")?;
    let path = Path::new(&file_path);
    if !path.exists() {
        return Ok(json!({ "error": format!("File not found: {}", file_path) }));
    }
    let deck = match Deck::open(path) {
        Ok(deck) => deck,
        Err(e) => return Ok(json!({ "error": format!("Failed to open presentation: {:#}", e) })),
    };
    let slide_count = deck.slides.len();
    let id = ctx.sessions.insert(args.opt_str("id")?, deck);
    ctx.sessions.set_current(&id);
    Ok(json!({
        "presentation_id": id,
        "message": format!("Opened presentation from {} with ID: {}", file_path, id),
        "slide_count": slide_count,
    }))
}

pub fn save_presentation(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let file_path = args.str("file_path")?;
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    match ctx.deck(&id)?.save(Path::new(&file_path)) {
        Ok(saved) => Ok(json!({
            "presentation_id": id,
            "message": format!("Presentation saved to {}", saved),
            "file_path": saved,
        })),
        Err(e) => Ok(json!({ "error": format!("Failed to save presentation: {:#}", e) })),
    }
}

pub fn get_presentation_info(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let mut info = ctx.deck(&id)?.info();
    info["presentation_id"] = json!(id);
    Ok(info)
}

pub fn get_template_file_info(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let template_path = args.str("template_path")?;
    let Some(resolved) = ctx.find_template(&template_path) else {
        return Ok(template_not_found(ctx, &template_path));
    };
    let deck = match Deck::open(&resolved) {
        Ok(deck) => deck,
        Err(e) => return Ok(json!({ "error": format!("Failed to get template info: {:#}", e) })),
    };
    Ok(json!({
        "template_path": resolved.display().to_string(),
        "slide_count": deck.slides.len(),
        "layout_count": deck.layouts.len(),
        "layouts": deck.layouts.iter().enumerate().map(|(index, layout)| json!({
            "index": index,
            "name": layout.name,
            "placeholders": layout.placeholders,
        })).collect::<Vec<_>>(),
        "core_properties": deck.core,
    }))
}

pub fn set_core_properties(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let title = args.opt_str("title")?;
    let subject = args.opt_str("subject")?;
    let author = args.opt_str("author")?;
    let keywords = args.opt_str("keywords")?;
    let comments = args.opt_str("comments")?;

    let core = &mut ctx.deck_mut(&id)?.core;
    let mut updated = Vec::new();
    for (field, slot, value) in [
        ("title", &mut core.title, title),
        ("subject", &mut core.subject, subject),
        ("author", &mut core.author, author),
        ("keywords", &mut core.keywords, keywords),
        ("comments", &mut core.comments, comments),
    ] {
        if let Some(value) = value {
            *slot = Some(value);
            updated.push(field);
        }
    }
    Ok(json!({
        "presentation_id": id,
        "message": "Core properties updated successfully",
        "updated": updated,
    }))
}

// ============================================================================
// TESTS
// ============================================================================
