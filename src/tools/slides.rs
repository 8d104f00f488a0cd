// Deck Gate - Slide Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Slide-level editing and text extraction on the resolved session.
// Out-of-range slide or layout indices are hard errors (the caller
// gets an internal error carrying the message).

use super::{no_presentation, Args};
use crate::context::ToolContext;
use anyhow::Result;
use serde_json::{json, Value};

pub const ADD_SLIDE_DOC: &str = "Add a new slide to the presentation.

Args:
    layout_index: Slide layout to use (0 = title slide, 1 = title and content)
    title: Optional title text for the new slide
    presentation_id: Target presentation (defaults to the current one)
";

pub const SLIDE_INFO_DOC: &str = "Get information about a specific slide.

Args:
    slide_index: Zero-based slide index
    presentation_id: Target presentation (defaults to the current one)
";

pub const POPULATE_DOC: &str = "Populate a placeholder with text.

Args:
    slide_index: Zero-based slide index
    placeholder_idx: Placeholder index on the slide layout (0 is the title)
    text: Text to place; newlines become separate paragraphs
    presentation_id: Target presentation (defaults to the current one)
";

pub const BULLETS_DOC: &str = "Add bullet points to a slide's body placeholder.

Args:
    slide_index: Zero-based slide index
    bullet_points: Bullet texts, in order
    presentation_id: Target presentation (defaults to the current one)
";

pub const SLIDE_TEXT_DOC: &str = "Extract all text content from a slide.

Args:
    slide_index: Zero-based slide index
    presentation_id: Target presentation (defaults to the current one)
";

pub const PRESENTATION_TEXT_DOC: &str = "Extract text content from every slide in the presentation.

Args:
    presentation_id: Target presentation (defaults to the current one)
    include_slide_info: Include layout name and slide title per slide
";

pub fn add_slide(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let layout_index = args.index_or("layout_index", 1)?;
    let title = args.opt_str("title")?;
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let deck = ctx.deck_mut(&id)?;
    let slide_index = deck.add_slide(layout_index)?;
    if let Some(title) = &title {
        deck.set_title(slide_index, title)?;
    }
    let layout_name = deck.layouts[layout_index].name.clone();
    Ok(json!({
        "presentation_id": id,
        "message": format!("Added slide {} with layout '{}'", slide_index, layout_name),
        "slide_index": slide_index,
        "layout_name": layout_name,
        "slide_count": deck.slides.len(),
    }))
}

pub fn get_slide_info(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let slide_index = args.index("slide_index")?;
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let mut info = ctx.deck(&id)?.slide_info(slide_index)?;
    info["presentation_id"] = json!(id);
    Ok(info)
}

pub fn populate_placeholder(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let slide_index = args.index("slide_index")?;
    let placeholder = args.index("placeholder_idx")?;
    let text = args.str("text")?;
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let placeholder = u32::try_from(placeholder)?;
    ctx.deck_mut(&id)?.populate_placeholder(slide_index, placeholder, &text)?;
    Ok(json!({
        "presentation_id": id,
        "message": format!("Populated placeholder {} on slide {}", placeholder, slide_index),
    }))
}

pub fn add_bullet_points(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let slide_index = args.index("slide_index")?;
    let bullets = args.str_list("bullet_points")?;
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let paragraph_count = ctx.deck_mut(&id)?.add_bullets(slide_index, &bullets)?;
    Ok(json!({
        "presentation_id": id,
        "message": format!("Added {} bullet points to slide {}", bullets.len(), slide_index),
        "paragraph_count": paragraph_count,
    }))
}

pub fn extract_slide_text(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let slide_index = args.index("slide_index")?;
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let paragraphs = ctx.deck(&id)?.slide_text(slide_index)?;
    Ok(json!({
        "presentation_id": id,
        "slide_index": slide_index,
        "text": paragraphs.join("\n"),
        "paragraphs": paragraphs,
    }))
}

pub fn extract_presentation_text(ctx: &mut ToolContext<'_>, args: &Args<'_>) -> Result<Value> {
    let include_info = args.bool_or("include_slide_info", false)?;
    let Some(id) = ctx.resolve(args.opt_str("presentation_id")?.as_deref()) else {
        return Ok(no_presentation());
    };
    let deck = ctx.deck(&id)?;
    let mut slides = Vec::with_capacity(deck.slides.len());
    let mut all_text = Vec::new();
    for (index, slide) in deck.slides.iter().enumerate() {
        let text = deck.slide_text(index)?.join("\n");
        let mut entry = json!({ "slide_index": index, "text": text });
        if include_info {
            entry["layout_name"] = json!(deck.layouts[slide.layout_index].name);
            entry["title"] = json!(slide.title);
        }
        if !text.is_empty() {
            all_text.push(text);
        }
        slides.push(entry);
    }
    Ok(json!({
        "presentation_id": id,
        "slide_count": deck.slides.len(),
        "slides": slides,
        "all_text": all_text.join("\n\n"),
    }))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::deck::Deck;
    use crate::session::SessionStore;

    fn run(func: super::super::ToolFn, sessions: &mut SessionStore, args: Value) -> Result<Value> {
        let config = GatewayConfig::default();
        let mut ctx = ToolContext {
            sessions,
            config: &config,
            template_dirs: &[],
            tool_count: 0,
        };
        let map = args.as_object().cloned().unwrap_or_default();
        func(&mut ctx, &Args::new(&map))
    }

    fn store_with_deck() -> SessionStore {
        let mut sessions = SessionStore::new(4);
        let id = sessions.insert(Some("d".into()), Deck::new());
        sessions.set_current(&id);
        sessions
    }

    #[test]
    fn add_slide_then_bullets_then_extract() {
        let mut sessions = store_with_deck();
        let added = run(add_slide, &mut sessions, json!({"title": "Agenda"})).unwrap();
        assert_eq!(added["slide_index"], 0);
        assert_eq!(added["layout_name"], "Title and Content");

        let bullets = run(
            add_bullet_points,
            &mut sessions,
            json!({"slide_index": 0, "bullet_points": ["One", "Two"]}),
        )
        .unwrap();
        assert_eq!(bullets["paragraph_count"], 2);

        let text = run(extract_slide_text, &mut sessions, json!({"slide_index": 0})).unwrap();
        assert_eq!(text["text"], "Agenda\nOne\nTwo");

        let all = run(extract_presentation_text, &mut sessions, json!({"include_slide_info": true})).unwrap();
        assert_eq!(all["slide_count"], 1);
        assert_eq!(all["slides"][0]["title"], "Agenda");
    }

    #[test]
    fn bad_indices_are_hard_errors() {
        let mut sessions = store_with_deck();
        let err = run(add_slide, &mut sessions, json!({"layout_index": 42})).unwrap_err();
        assert!(err.to_string().contains("Invalid slide layout index 42"));
        assert!(run(get_slide_info, &mut sessions, json!({"slide_index": 3})).is_err());
    }

    #[test]
    fn blank_layout_rejects_placeholder() {
        let mut sessions = store_with_deck();
        run(add_slide, &mut sessions, json!({"layout_index": 6})).unwrap();
        let err = run(
            populate_placeholder,
            &mut sessions,
            json!({"slide_index": 0, "placeholder_idx": 1, "text": "x"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Placeholder 1 not found"));
    }

    #[test]
    fn no_session_is_soft_error() {
        let mut sessions = SessionStore::new(4);
        let result = run(add_slide, &mut sessions, json!({})).unwrap();
        assert_eq!(result["error"], super::super::NO_PRESENTATION);
    }
}
