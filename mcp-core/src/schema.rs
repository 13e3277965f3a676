//! Schema validator (C3): embedded MCP JSON Schemas, compiled once and
//! cached by message kind.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::McpError;

/// Which embedded schema a payload should be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Request,
    Response,
    Notification,
    Initialize,
    Initialized,
}

impl SchemaKind {
    fn source(self) -> &'static str {
        match self {
            SchemaKind::Request => include_str!("../schemas/request.schema.json"),
            SchemaKind::Response => include_str!("../schemas/response.schema.json"),
            SchemaKind::Notification => include_str!("../schemas/notification.schema.json"),
            SchemaKind::Initialize => include_str!("../schemas/initialize.schema.json"),
            SchemaKind::Initialized => include_str!("../schemas/initialized.schema.json"),
        }
    }
}

static VALIDATORS: Lazy<HashMap<&'static str, jsonschema::Validator>> = Lazy::new(|| {
    [
        SchemaKind::Request,
        SchemaKind::Response,
        SchemaKind::Notification,
        SchemaKind::Initialize,
        SchemaKind::Initialized,
    ]
    .into_iter()
    .map(|kind| {
        #[expect(clippy::expect_used, reason = "embedded schemas are fixed at compile time")]
        let document: Value =
            serde_json::from_str(kind.source()).expect("embedded schema must be valid JSON");
        #[expect(clippy::expect_used, reason = "embedded schemas are fixed at compile time")]
        let validator = jsonschema::validator_for(&document).expect("embedded schema must compile");
        (kind_key(kind), validator)
    })
    .collect()
});

fn kind_key(kind: SchemaKind) -> &'static str {
    match kind {
        SchemaKind::Request => "request",
        SchemaKind::Response => "response",
        SchemaKind::Notification => "notification",
        SchemaKind::Initialize => "initialize",
        SchemaKind::Initialized => "initialized",
    }
}

/// Whether validation actually runs. `Disabled` unconditionally returns
/// `Ok(())` without reading the payload, for production deployments that
/// have already paid the conformance cost out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Enabled,
    Disabled,
}

/// Stateless, thread-safe after construction — the compiled schemas live in
/// a process-wide cache, so cloning a `Validator` is free.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    mode: Mode,
}

impl Validator {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    pub fn enabled() -> Self {
        Self::new(Mode::Enabled)
    }

    pub fn disabled() -> Self {
        Self::new(Mode::Disabled)
    }

    /// Validate `payload` against the schema registered for `kind`.
    pub fn validate(&self, kind: SchemaKind, payload: &Value) -> Result<(), McpError> {
        if self.mode == Mode::Disabled {
            return Ok(());
        }
        #[expect(clippy::expect_used, reason = "every SchemaKind variant is seeded into VALIDATORS above")]
        let validator = VALIDATORS
            .get(kind_key(kind))
            .expect("every SchemaKind has a registered validator");
        match validator.validate(payload) {
            Ok(()) => Ok(()),
            Err(error) => Err(McpError::invalid_params(
                kind_key(kind),
                Some(error.instance_path.to_string()),
                error.to_string(),
            )),
        }
    }

    /// Resolve the params schema for a given method name, if one is
    /// registered; unregistered methods validate structurally only (the
    /// envelope shape via [`SchemaKind::Request`]), per spec.md §4.3.
    pub fn params_kind_for_method(method: &str) -> Option<SchemaKind> {
        match method {
            "initialize" => Some(SchemaKind::Initialize),
            "initialized" => Some(SchemaKind::Initialized),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn disabled_mode_accepts_anything() {
        let validator = Validator::disabled();
        let result = validator.validate(SchemaKind::Request, &json!({"not": "a request"}));
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn enabled_mode_accepts_well_formed_request() {
        let validator = Validator::enabled();
        let payload = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        assert_eq!(validator.validate(SchemaKind::Request, &payload), Ok(()));
    }

    #[test]
    fn enabled_mode_rejects_missing_jsonrpc_field() {
        let validator = Validator::enabled();
        let payload = json!({"id": 1, "method": "tools/list"});
        assert!(validator.validate(SchemaKind::Request, &payload).is_err());
    }

    #[test]
    fn initialize_params_require_all_three_fields() {
        let validator = Validator::enabled();
        let payload = json!({"protocolVersion": "1.0"});
        assert!(validator.validate(SchemaKind::Initialize, &payload).is_err());
    }

    #[test]
    fn params_kind_for_method_resolves_known_methods() {
        assert_eq!(
            Validator::params_kind_for_method("initialize"),
            Some(SchemaKind::Initialize)
        );
        assert_eq!(Validator::params_kind_for_method("tools/list"), None);
    }
}
