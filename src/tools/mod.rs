// Deck Gate - Document Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// The presentation tool set. Every tool is a plain function over a
// ToolContext and a flat JSON argument map, returning a JSON result.
// Each catalog entry declares:
//   - a typed signature (schema source of truth)
//   - a doc text with `name: description` lines
//   - capabilities: mutating (sets the session dirty flag),
//     saves (the explicit save operation)

pub mod presentation;
pub mod sessions;
pub mod slides;

use crate::context::ToolContext;
use crate::schema::{Signature, TypeHint};
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Callable form of every tool
pub type ToolFn = fn(&mut ToolContext<'_>, &Args<'_>) -> Result<Value>;

/// Soft failure returned when no session can be resolved
pub const NO_PRESENTATION: &str = "No presentation is currently loaded or the specified ID is invalid";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Capabilities {
    /// Edits the in-memory document of its session
    #[serde(default)]
    pub mutating: bool,
    /// Writes the document to its file_path (the explicit save operation)
    #[serde(default)]
    pub saves: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities { mutating: false, saves: false };
    pub const MUTATING: Capabilities = Capabilities { mutating: true, saves: false };
    pub const SAVES: Capabilities = Capabilities { mutating: false, saves: true };
}

/// One catalog entry
pub struct ToolSpec {
    pub name: &'static str,
    pub func: ToolFn,
    pub doc: &'static str,
    pub signature: Signature,
    pub capabilities: Capabilities,
}

fn spec(name: &'static str, func: ToolFn, doc: &'static str, signature: Signature, capabilities: Capabilities) -> ToolSpec {
    ToolSpec { name, func, doc, signature, capabilities }
}

fn opt_str() -> TypeHint {
    TypeHint::optional(TypeHint::Str)
}

/// Every builtin tool, in listing order
pub fn catalog() -> Vec<ToolSpec> {
    let pid = |sig: Signature| sig.arg_default("presentation_id", opt_str(), Value::Null);
    vec![
        spec(
            "create_presentation",
            presentation::create_presentation,
            presentation::CREATE_DOC,
            Signature::new()
                .arg_default("id", opt_str(), Value::Null)
                .arg_default("file_path", opt_str(), Value::Null)
                .arg_default("title", opt_str(), Value::Null)
                .arg_default("subtitle", opt_str(), Value::Null)
                .arg_default("slide_layout_index", TypeHint::Int, json!(0))
                .arg_default("set_as_current", TypeHint::Bool, json!(true))
                .arg_default("auto_save", TypeHint::Bool, json!(true)),
            Capabilities::MUTATING,
        ),
        spec(
            "create_presentation_from_template",
            presentation::create_presentation_from_template,
            presentation::FROM_TEMPLATE_DOC,
            Signature::new()
                .arg("template_path", TypeHint::Str)
                .arg_default("id", opt_str(), Value::Null),
            Capabilities::MUTATING,
        ),
        spec(
            "open_presentation",
            presentation::open_presentation,
            presentation::OPEN_DOC,
            Signature::new()
                .arg("file_path", TypeHint::Str)
                .arg_default("id", opt_str(), Value::Null),
            Capabilities::NONE,
        ),
        spec(
            "save_presentation",
            presentation::save_presentation,
            presentation::SAVE_DOC,
            pid(Signature::new().arg("file_path", TypeHint::Str)),
            Capabilities::SAVES,
        ),
        spec(
            "get_presentation_info",
            presentation::get_presentation_info,
            presentation::INFO_DOC,
            pid(Signature::new()),
            Capabilities::NONE,
        ),
        spec(
            "get_template_file_info",
            presentation::get_template_file_info,
            presentation::TEMPLATE_INFO_DOC,
            Signature::new().arg("template_path", TypeHint::Str),
            Capabilities::NONE,
        ),
        spec(
            "set_core_properties",
            presentation::set_core_properties,
            presentation::CORE_PROPERTIES_DOC,
            pid(Signature::new()
                .arg_default("title", opt_str(), Value::Null)
                .arg_default("subject", opt_str(), Value::Null)
                .arg_default("author", opt_str(), Value::Null)
                .arg_default("keywords", opt_str(), Value::Null)
                .arg_default("comments", opt_str(), Value::Null)),
            Capabilities::MUTATING,
        ),
        spec(
            "add_slide",
            slides::add_slide,
            slides::ADD_SLIDE_DOC,
            pid(Signature::new()
                .arg_default("layout_index", TypeHint::Int, json!(1))
                .arg_default("title", opt_str(), Value::Null)),
            Capabilities::MUTATING,
        ),
        spec(
            "get_slide_info",
            slides::get_slide_info,
            slides::SLIDE_INFO_DOC,
            pid(Signature::new().arg("slide_index", TypeHint::Int)),
            Capabilities::NONE,
        ),
        spec(
            "populate_placeholder",
            slides::populate_placeholder,
            slides::POPULATE_DOC,
            pid(Signature::new()
                .arg("slide_index", TypeHint::Int)
                .arg("placeholder_idx", TypeHint::Int)
                .arg("text", TypeHint::Str)),
            Capabilities::MUTATING,
        ),
        spec(
            "add_bullet_points",
            slides::add_bullet_points,
            slides::BULLETS_DOC,
            pid(Signature::new()
                .arg("slide_index", TypeHint::Int)
                .arg("bullet_points", TypeHint::List)),
            Capabilities::MUTATING,
        ),
        spec(
            "extract_slide_text",
            slides::extract_slide_text,
            slides::SLIDE_TEXT_DOC,
            pid(Signature::new().arg("slide_index", TypeHint::Int)),
            Capabilities::NONE,
        ),
        spec(
            "extract_presentation_text",
            slides::extract_presentation_text,
            slides::PRESENTATION_TEXT_DOC,
            pid(Signature::new()).arg_default("include_slide_info", TypeHint::Bool, json!(false)),
            Capabilities::NONE,
        ),
        spec(
            "list_presentations",
            sessions::list_presentations,
            sessions::LIST_DOC,
            Signature::new(),
            Capabilities::NONE,
        ),
        spec(
            "switch_presentation",
            sessions::switch_presentation,
            sessions::SWITCH_DOC,
            Signature::new().arg("presentation_id", TypeHint::Str),
            Capabilities::NONE,
        ),
        spec(
            "close_presentation",
            sessions::close_presentation,
            sessions::CLOSE_DOC,
            pid(Signature::new()),
            Capabilities::NONE,
        ),
        spec(
            "get_server_info",
            sessions::get_server_info,
            sessions::SERVER_INFO_DOC,
            Signature::new(),
            Capabilities::NONE,
        ),
    ]
}

/// Catalog entry by tool name
pub fn lookup(name: &str) -> Option<ToolSpec> {
    catalog().into_iter().find(|spec| spec.name == name)
}

/// Tool names in listing order
pub fn names() -> Vec<&'static str> {
    catalog().iter().map(|spec| spec.name).collect()
}

fn no_presentation() -> Value {
    json!({ "error": NO_PRESENTATION })
}

// ============================================================================
// ARGUMENTS
// ============================================================================

/// Typed reads over a flat argument map. `null` counts as absent.
pub struct Args<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => bail!("argument '{}' must be a string, got {}", name, other),
        }
    }

    pub fn str(&self, name: &str) -> Result<String> {
        self.opt_str(name)?
            .ok_or_else(|| anyhow!("missing required argument '{}'", name))
    }

    pub fn opt_int(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| anyhow!("argument '{}' must be an integer, got {}", name, n)),
            // Callers frequently send numbers as strings
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| anyhow!("argument '{}' must be an integer, got {:?}", name, s)),
            Some(other) => bail!("argument '{}' must be an integer, got {}", name, other),
        }
    }

    /// Non-negative index
    pub fn index(&self, name: &str) -> Result<usize> {
        let value = self
            .opt_int(name)?
            .ok_or_else(|| anyhow!("missing required argument '{}'", name))?;
        usize::try_from(value).map_err(|_| anyhow!("argument '{}' must not be negative, got {}", name, value))
    }

    pub fn index_or(&self, name: &str, default: usize) -> Result<usize> {
        if self.get(name).is_none() {
            return Ok(default);
        }
        self.index(name)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => bail!("argument '{}' must be a boolean, got {:?}", name, s),
            },
            Some(other) => bail!("argument '{}' must be a boolean, got {}", name, other),
        }
    }

    /// List of strings. A bare string is one item; non-strings are stringified.
    pub fn str_list(&self, name: &str) -> Result<Vec<String>> {
        match self.get(name) {
            None => bail!("missing required argument '{}'", name),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(other) => bail!("argument '{}' must be a list of strings, got {}", name, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn catalog_names_unique() {
        let names = names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names.len(), 17);
    }

    #[test]
    fn only_save_presentation_saves() {
        let saving: Vec<&str> = catalog()
            .into_iter()
            .filter(|s| s.capabilities.saves)
            .map(|s| s.name)
            .collect();
        assert_eq!(saving, vec!["save_presentation"]);
    }

    #[test]
    fn every_declared_param_is_documented() {
        for spec in catalog() {
            for param in spec.signature.visible() {
                assert!(
                    spec.doc.contains(&format!("{}:", param.name)),
                    "{} does not document {}",
                    spec.name,
                    param.name
                );
            }
        }
    }

    #[test]
    fn args_coerce_loosely_typed_values() {
        let raw = map(json!({
            "slide_index": "2",
            "flag": "false",
            "count": 3.0,
            "name": null,
            "items": "solo",
        }));
        let args = Args::new(&raw);
        assert_eq!(args.index("slide_index").unwrap(), 2);
        assert!(!args.bool_or("flag", true).unwrap());
        assert_eq!(args.opt_int("count").unwrap(), Some(3));
        assert_eq!(args.opt_str("name").unwrap(), None);
        assert_eq!(args.str_list("items").unwrap(), vec!["solo"]);
        assert_eq!(args.index_or("absent", 7).unwrap(), 7);
    }

    #[test]
    fn args_reject_bad_values() {
        let raw = map(json!({"slide_index": -1, "title": [1], "flag": 4}));
        let args = Args::new(&raw);
        assert!(args.index("slide_index").is_err());
        assert!(args.opt_str("title").is_err());
        assert!(args.bool_or("flag", false).is_err());
        assert!(args.str("missing").unwrap_err().to_string().contains("missing"));
    }
}
