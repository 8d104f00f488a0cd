// Deck Gate - Error Taxonomy
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One error type for the core. Each variant maps to exactly one JSON-RPC
// error code; transports never inspect messages to pick a code.

/// JSON-RPC: request body could not be parsed
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC: request is not a valid request object
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC: method or tool not found
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC: invalid params (missing target document, bad arguments)
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC: internal error (wraps any invocation failure)
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Presentation {0} not found")]
    DocumentNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Error calling tool {tool}: {message}")]
    Invocation { tool: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// JSON-RPC error code for this error
    pub fn code(&self) -> i64 {
        match self {
            GatewayError::MethodNotFound(_) | GatewayError::ToolNotFound(_) => METHOD_NOT_FOUND,
            GatewayError::DocumentNotFound(_) | GatewayError::InvalidParams(_) => INVALID_PARAMS,
            GatewayError::Invocation { .. }
            | GatewayError::Storage(_)
            | GatewayError::Io(_)
            | GatewayError::Json(_) => INTERNAL_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::DocumentNotFound(_) | GatewayError::ToolNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(GatewayError::ToolNotFound("x".into()).code(), -32601);
        assert_eq!(GatewayError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(GatewayError::DocumentNotFound("a.pptx".into()).code(), -32602);
        let invocation = GatewayError::Invocation { tool: "t".into(), message: "boom".into() };
        assert_eq!(invocation.code(), -32603);
        assert_eq!(invocation.to_string(), "Error calling tool t: boom");
    }

    #[test]
    fn not_found_message_names_document() {
        let err = GatewayError::DocumentNotFound("missing.pptx".into());
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing.pptx"));
    }
}
