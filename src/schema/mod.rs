// Deck Gate - Schema Inference
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Derives a tool's parameter schema. Two strategies, in order:
//   1. Declared signature (typed parameter list given at registration)
//   2. Declaration source (parse the tool's defining source text)
// Either may come back empty. Inference never fails a request: the worst
// case is an empty object schema and a warning in the log.

pub mod signature;
pub mod source;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::Path;

pub use signature::{Param, Signature};
pub use source::SourceLocation;

/// Parameter names treated as an implicit receiver, never exposed
pub const RECEIVER_NAMES: &[&str] = &["self", "cls"];

/// JSON Schema primitive types a parameter can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// Declared parameter type, as written at the declaration site
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
    NoneType,
    Unannotated,
    Optional(Box<TypeHint>),
    Union(Vec<TypeHint>),
    Other(String),
}

impl TypeHint {
    pub fn optional(inner: TypeHint) -> Self {
        TypeHint::Optional(Box::new(inner))
    }

    /// Peel one level of "optional": Optional[T] or a union of T with None
    pub fn unwrap_optional(&self) -> &TypeHint {
        match self {
            TypeHint::Optional(inner) => inner,
            TypeHint::Union(members) => {
                let mut rest = members.iter().filter(|m| **m != TypeHint::NoneType);
                match (rest.next(), rest.next()) {
                    (Some(only), None) if members.len() > 1 => only,
                    _ => self,
                }
            }
            other => other,
        }
    }

    /// Fixed hint -> JSON type table. Anything unrecognized is a string.
    pub fn json_type(&self) -> JsonType {
        match self.unwrap_optional() {
            TypeHint::Str => JsonType::String,
            TypeHint::Int => JsonType::Integer,
            TypeHint::Float => JsonType::Number,
            TypeHint::Bool => JsonType::Boolean,
            TypeHint::List => JsonType::Array,
            TypeHint::Dict => JsonType::Object,
            _ => JsonType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSchema {
    pub name: String,
    pub ty: JsonType,
    pub description: String,
    pub required: bool,
}

/// Ordered parameter schema for one tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub params: Vec<ParamSchema>,
    /// Accepts keywords beyond `params` (`**kwargs`)
    pub extra_keywords: bool,
}

impl Schema {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn required(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// `inputSchema` object for tools/list
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = json!({
                "type": param.ty,
                "description": param.description,
            });
            if param.ty == JsonType::Array {
                prop["items"] = json!({"type": "string"});
            }
            properties.insert(param.name.clone(), prop);
        }
        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        let required = self.required();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        if self.extra_keywords {
            schema["additionalProperties"] = json!(true);
        }
        schema
    }
}

/// Description for `name` from a doc text line `name: text`, or a placeholder
pub fn describe(doc: Option<&str>, name: &str) -> String {
    doc.and_then(|doc| {
        let pattern = format!(r"(?m)(?:^|[^\w]){}:[ \t]*([^\n]+)", regex::escape(name));
        let re = Regex::new(&pattern).ok()?;
        let text = re.captures(doc)?.get(1)?.as_str().trim().to_string();
        (!text.is_empty()).then_some(text)
    })
    .unwrap_or_else(|| format!("Parameter: {}", name))
}

/// Infer a schema: declared signature first, declaration source second
pub fn infer(
    tool_name: &str,
    signature: Option<&Signature>,
    doc: Option<&str>,
    source: Option<&SourceLocation>,
    cwd: &Path,
) -> Schema {
    if let Some(signature) = signature {
        let schema = signature.schema(doc);
        if !schema.is_empty() {
            return schema;
        }
    }

    let Some(source) = source else {
        if signature.is_none() {
            log::warn!("No signature or source for tool {}, schema left empty", tool_name);
        }
        return Schema::empty();
    };

    match source::infer_from_source(tool_name, doc, source, cwd) {
        Ok(schema) => {
            if schema.is_empty() {
                log::warn!("Tool {} not found in its declaration source, schema left empty", tool_name);
            }
            schema
        }
        Err(e) => {
            log::warn!("Schema inference failed for {}: {:#}", tool_name, e);
            Schema::empty()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_table() {
        assert_eq!(TypeHint::Str.json_type(), JsonType::String);
        assert_eq!(TypeHint::Int.json_type(), JsonType::Integer);
        assert_eq!(TypeHint::Float.json_type(), JsonType::Number);
        assert_eq!(TypeHint::Bool.json_type(), JsonType::Boolean);
        assert_eq!(TypeHint::List.json_type(), JsonType::Array);
        assert_eq!(TypeHint::Dict.json_type(), JsonType::Object);
        assert_eq!(TypeHint::Unannotated.json_type(), JsonType::String);
        assert_eq!(TypeHint::NoneType.json_type(), JsonType::String);
        assert_eq!(TypeHint::Other("Shape".into()).json_type(), JsonType::String);
    }

    #[test]
    fn optional_unwraps_one_level_only() {
        assert_eq!(TypeHint::optional(TypeHint::Int).json_type(), JsonType::Integer);
        let union = TypeHint::Union(vec![TypeHint::Bool, TypeHint::NoneType]);
        assert_eq!(union.json_type(), JsonType::Boolean);
        let nested = TypeHint::optional(TypeHint::optional(TypeHint::Int));
        assert_eq!(nested.json_type(), JsonType::String);
        let wide = TypeHint::Union(vec![TypeHint::Int, TypeHint::Str, TypeHint::NoneType]);
        assert_eq!(wide.json_type(), JsonType::String);
    }

    #[test]
    fn describe_reads_doc_lines() {
        let doc = "Create a deck.\n\nArgs:\n    id: Optional identifier\n    presentation_id: Target deck\n";
        assert_eq!(describe(Some(doc), "id"), "Optional identifier");
        assert_eq!(describe(Some(doc), "presentation_id"), "Target deck");
        assert_eq!(describe(Some(doc), "title"), "Parameter: title");
        assert_eq!(describe(None, "x"), "Parameter: x");
    }

    #[test]
    fn schema_json_shape() {
        let schema = Schema {
            params: vec![
                ParamSchema {
                    name: "file_path".into(),
                    ty: JsonType::String,
                    description: "Where".into(),
                    required: true,
                },
                ParamSchema {
                    name: "bullets".into(),
                    ty: JsonType::Array,
                    description: "Items".into(),
                    required: false,
                },
            ],
            extra_keywords: false,
        };
        let value = schema.to_json();
        assert!(value.get("additionalProperties").is_none());
        assert_eq!(value["type"], "object");
        assert_eq!(value["required"], json!(["file_path"]));
        assert_eq!(value["properties"]["bullets"]["items"]["type"], "string");
        let keys: Vec<&String> = value["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["file_path", "bullets"]);
    }

    #[test]
    fn empty_schema_is_bare_object() {
        assert_eq!(Schema::empty().to_json(), json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn infer_without_anything_is_empty() {
        let schema = infer("t", None, None, None, Path::new("."));
        assert!(schema.is_empty());
    }
}
