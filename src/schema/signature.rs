// Deck Gate - Declared Signatures
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Typed parameter lists attached to callables at registration.
// A parameter is required iff it declares no default.

use super::{describe, ParamSchema, Schema, TypeHint, RECEIVER_NAMES};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub hint: TypeHint,
    /// None = no default (required). Some(Value::Null) is a None default.
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Required parameter
    pub fn arg(mut self, name: &str, hint: TypeHint) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            hint,
            default: None,
        });
        self
    }

    /// Parameter with a default value
    pub fn arg_default(mut self, name: &str, hint: TypeHint, default: Value) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            hint,
            default: Some(default),
        });
        self
    }

    /// Parameters a caller supplies (leading receiver skipped)
    pub fn visible(&self) -> &[Param] {
        match self.params.first() {
            Some(first) if RECEIVER_NAMES.contains(&first.name.as_str()) => &self.params[1..],
            _ => &self.params,
        }
    }

    /// Schema from the declared parameters; descriptions come from `doc`
    pub fn schema(&self, doc: Option<&str>) -> Schema {
        Schema {
            params: self
                .visible()
                .iter()
                .map(|p| ParamSchema {
                    name: p.name.clone(),
                    ty: p.hint.json_type(),
                    description: describe(doc, &p.name),
                    required: p.default.is_none(),
                })
                .collect(),
            extra_keywords: false,
        }
    }

    /// Declared default for a parameter, if any
    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.visible()
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.default.as_ref())
    }
}

// ============================================================================
// TESTS
// ============================================================================
