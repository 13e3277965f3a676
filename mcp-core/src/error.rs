//! Canonical error taxonomy (C2) and its projection onto the wire.
//!
//! Every fallible operation in this crate returns `Result<T, McpError>`.
//! `McpError` is never serialized directly; callers project it to a
//! [`JSONRPCErrorError`] via [`McpError::to_response`] once an `id` (or the
//! absence of one) is known.

use mcp_types::JSONRPCErrorError;
use mcp_types::error_code::CONNECTION_ERROR_CODE;
use mcp_types::error_code::INTERNAL_ERROR_CODE;
use mcp_types::error_code::INVALID_PARAMS_ERROR_CODE;
use mcp_types::error_code::INVALID_REQUEST_ERROR_CODE;
use mcp_types::error_code::METHOD_NOT_FOUND_ERROR_CODE;
use mcp_types::error_code::NOT_INITIALIZED_ERROR_CODE;
use mcp_types::error_code::PARSE_ERROR_CODE;
use mcp_types::error_code::RESOURCE_LIMIT_ERROR_CODE;
use serde_json::Value;
use serde_json::json;

pub mod redaction;

/// One of the nine error categories from the error handling design. Each
/// variant knows how to render its own `code`/`message`/`data`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    #[error("Parse error")]
    Parse,

    #[error("Invalid Request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid params for `{method}`: {reason}")]
    InvalidParams {
        method: String,
        path: Option<String>,
        reason: String,
    },

    #[error("Not initialized")]
    NotInitialized { state: String, method: String },

    #[error("Connection error: {reason}")]
    ConnectionError { reason: String },

    #[error("Resource limit exceeded: {reason}")]
    ResourceLimit { reason: String },

    #[error("Internal error: {detail}")]
    Internal { detail: String },

    /// Escape hatch for handler-supplied errors that already carry a
    /// server-reserved or application-range code (spec.md §7 category 7:
    /// handler errors are passed through verbatim when they already have
    /// one of those codes).
    #[error("{message}")]
    Application {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

impl McpError {
    pub fn parse_error() -> Self {
        Self::Parse
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    pub fn invalid_params(
        method: impl Into<String>,
        path: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParams {
            method: method.into(),
            path,
            reason: reason.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    pub fn not_initialized(state: impl Into<String>, method: impl Into<String>) -> Self {
        Self::NotInitialized {
            state: state.into(),
            method: method.into(),
        }
    }

    pub fn connection_error(reason: impl Into<String>) -> Self {
        Self::ConnectionError {
            reason: reason.into(),
        }
    }

    pub fn resource_limit(reason: impl Into<String>) -> Self {
        Self::ResourceLimit {
            reason: reason.into(),
        }
    }

    pub fn application(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Application {
            code,
            message: message.into(),
            data,
        }
    }

    /// Integer code this error would carry on the wire. Equality of errors
    /// for classification purposes is by this value alone (spec.md §4.2).
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse => PARSE_ERROR_CODE,
            Self::InvalidRequest { .. } => INVALID_REQUEST_ERROR_CODE,
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND_ERROR_CODE,
            Self::InvalidParams { .. } => INVALID_PARAMS_ERROR_CODE,
            Self::NotInitialized { .. } => NOT_INITIALIZED_ERROR_CODE,
            Self::ConnectionError { .. } => CONNECTION_ERROR_CODE,
            Self::ResourceLimit { .. } => RESOURCE_LIMIT_ERROR_CODE,
            Self::Internal { .. } => INTERNAL_ERROR_CODE,
            Self::Application { code, .. } => *code,
        }
    }

    /// Project this error to the wire shape. `redact` applies the unified
    /// redaction policy to `data` (spec.md REDESIGN FLAGS: one policy
    /// consulted by both error construction and log emission).
    pub fn to_response(&self, redact: bool) -> JSONRPCErrorError {
        let (message, data) = match self {
            Self::Parse => ("Parse error".to_string(), None),
            Self::InvalidRequest { reason } => ("Invalid Request".to_string(), Some(json!({ "reason": reason }))),
            Self::MethodNotFound { method } => (
                "Method not found".to_string(),
                Some(json!({ "method": method })),
            ),
            Self::InvalidParams {
                method,
                path,
                reason,
            } => (
                "Invalid params".to_string(),
                Some(json!({ "method": method, "path": path, "reason": reason })),
            ),
            Self::NotInitialized { state, method } => (
                "Not initialized".to_string(),
                Some(json!({ "state": state, "method": method })),
            ),
            Self::ConnectionError { reason } => {
                ("Connection error".to_string(), Some(json!({ "reason": reason })))
            }
            Self::ResourceLimit { reason } => (
                "Resource limit exceeded".to_string(),
                Some(json!({ "reason": reason })),
            ),
            Self::Internal { .. } => {
                // Raw detail never reaches the wire; it is only logged by
                // the caller before this projection is built.
                ("Internal error".to_string(), None)
            }
            Self::Application {
                message, data, ..
            } => (message.clone(), data.clone()),
        };

        let data = if redact { data.map(|d| redaction::scrub(&d)) } else { data };

        JSONRPCErrorError {
            code: self.code(),
            message,
            data,
        }
    }
}

/// Implemented by any type an external handler may return as an error so it
/// can be projected onto the wire without the core knowing its concrete
/// shape (spec.md §6 handler contract: `handle(ctx, method, params) ->
/// (result, error)`).
pub trait ToErrorResponse {
    fn to_mcp_error(&self) -> McpError;
}

impl ToErrorResponse for McpError {
    fn to_mcp_error(&self) -> McpError {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn not_initialized_projects_state_and_method() {
        let err = McpError::not_initialized("New", "tools/list");
        let response = err.to_response(true);
        assert_eq!(response.code, NOT_INITIALIZED_ERROR_CODE);
        assert_eq!(response.message, "Not initialized");
        assert_eq!(
            response.data,
            Some(json!({ "state": "New", "method": "tools/list" }))
        );
    }

    #[test]
    fn internal_error_never_leaks_detail() {
        let err = McpError::internal("panic: index out of bounds at worker.rs:42");
        let response = err.to_response(true);
        assert_eq!(response.code, INTERNAL_ERROR_CODE);
        assert_eq!(response.message, "Internal error");
        assert_eq!(response.data, None);
    }

    #[test]
    fn application_error_passes_through_verbatim() {
        let err = McpError::application(-32010, "rate limited", Some(json!({ "retry_after": 5 })));
        let response = err.to_response(false);
        assert_eq!(response.code, -32010);
        assert_eq!(response.message, "rate limited");
        assert_eq!(response.data, Some(json!({ "retry_after": 5 })));
    }
}
