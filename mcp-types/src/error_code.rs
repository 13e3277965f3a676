//! Canonical JSON-RPC / MCP error codes (spec.md §3, §6).
//!
//! Consolidated into one table rather than the per-module `const`s the
//! teacher codebase scatters across `mcp-server::error_code` and
//! `app-server::error_code` — see DESIGN.md / REDESIGN FLAGS.

pub const PARSE_ERROR_CODE: i64 = -32700;
pub const INVALID_REQUEST_ERROR_CODE: i64 = -32600;
pub const METHOD_NOT_FOUND_ERROR_CODE: i64 = -32601;
pub const INVALID_PARAMS_ERROR_CODE: i64 = -32602;
pub const INTERNAL_ERROR_CODE: i64 = -32603;

/// Not initialized: a non-`initialize` request arrived before the
/// connection reached `Ready`.
pub const NOT_INITIALIZED_ERROR_CODE: i64 = -32001;
/// Connection-lifecycle fault: unknown connection id, or the handshake
/// timer fired. Spec.md §9 Open Question 1 leaves "should timeout get its
/// own code" unresolved; this implementation keeps both cases on -32002.
pub const CONNECTION_ERROR_CODE: i64 = -32002;
/// Work was rejected due to a resource ceiling (bounded queue full).
pub const RESOURCE_LIMIT_ERROR_CODE: i64 = -32003;

const RESERVED_RANGE: std::ops::RangeInclusive<i64> = -32768..=-32000;
const SERVER_RANGE: std::ops::RangeInclusive<i64> = -32099..=-32000;

/// Is `code` inside the JSON-RPC reserved range `[-32768, -32000]`?
pub fn is_reserved(code: i64) -> bool {
    RESERVED_RANGE.contains(&code)
}

/// Is `code` one of the fixed JSON-RPC standard codes?
pub fn is_standard(code: i64) -> bool {
    matches!(
        code,
        PARSE_ERROR_CODE
            | INVALID_REQUEST_ERROR_CODE
            | METHOD_NOT_FOUND_ERROR_CODE
            | INVALID_PARAMS_ERROR_CODE
            | INTERNAL_ERROR_CODE
    )
}

/// Is `code` in the implementation server-error range `[-32099, -32000]`
/// but not a standard code?
pub fn is_server_range(code: i64) -> bool {
    SERVER_RANGE.contains(&code) && !is_standard(code)
}

/// Is `code` outside the reserved range entirely (application-defined)?
pub fn is_application_range(code: i64) -> bool {
    !is_reserved(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_standard_codes() {
        assert!(is_standard(PARSE_ERROR_CODE));
        assert!(is_standard(INVALID_REQUEST_ERROR_CODE));
        assert!(!is_server_range(INVALID_REQUEST_ERROR_CODE));
    }

    #[test]
    fn classifies_server_range_codes() {
        assert!(is_server_range(NOT_INITIALIZED_ERROR_CODE));
        assert!(is_server_range(CONNECTION_ERROR_CODE));
        assert!(!is_standard(NOT_INITIALIZED_ERROR_CODE));
    }

    #[test]
    fn classifies_application_range_codes() {
        assert!(is_application_range(1));
        assert!(is_application_range(-31000));
        assert!(!is_application_range(-32500));
    }
}
