//! JSON-RPC 2.0 parse/marshal pipeline (C1).
//!
//! Operates one layer below [`mcp_types::JSONRPCMessage`]: that type assumes
//! an id is already known to be present and non-null, which is true for
//! every message this crate dispatches to a handler. The wire itself is
//! looser — a response's `id` may be a present JSON `null` (e.g. echoing a
//! request this server could not parse), so parsing produces [`RawMessage`]
//! first and only promotes to the typed [`mcp_types::JSONRPCMessage`] once
//! an id is known to be non-null.

use mcp_types::JSONRPCErrorError;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::JSONRPCResponse;
use mcp_types::JSONRPC_VERSION;
use mcp_types::RequestId;
use serde_json::Map;
use serde_json::Value;

use crate::error::McpError;

/// An id at the raw wire boundary: either a present, typed id, or a present
/// JSON `null`. Distinct from "the id key is absent" (a notification).
#[derive(Debug, Clone, PartialEq)]
pub enum RawId {
    Null,
    Present(RequestId),
}

impl RawId {
    pub fn into_request_id(self) -> Option<RequestId> {
        match self {
            RawId::Null => None,
            RawId::Present(id) => Some(id),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            RawId::Null => Value::Null,
            RawId::Present(RequestId::Integer(i)) => Value::from(*i),
            RawId::Present(RequestId::String(s)) => Value::String(s.clone()),
        }
    }
}

/// One message at the raw wire boundary (spec.md §3 Message).
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    Request {
        id: RawId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: RawId,
        result: Value,
    },
    Error {
        id: RawId,
        error: JSONRPCErrorError,
    },
}

impl RawMessage {
    /// Promote to the typed, dispatch-ready shape. `None` only for the
    /// vanishingly rare message whose id is a present JSON `null` — such a
    /// message cannot be correlated and is not handed to the router.
    pub fn into_typed(self) -> Option<JSONRPCMessage> {
        match self {
            RawMessage::Request { id, method, params } => Some(JSONRPCMessage::Request(JSONRPCRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.into_request_id()?,
                method,
                params,
            })),
            RawMessage::Notification { method, params } => {
                Some(JSONRPCMessage::Notification(JSONRPCNotification {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    method,
                    params,
                }))
            }
            RawMessage::Response { id, result } => Some(JSONRPCMessage::Response(JSONRPCResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.into_request_id()?,
                result,
            })),
            RawMessage::Error { id, error } => Some(JSONRPCMessage::Error(mcp_types::JSONRPCError {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.into_request_id()?,
                error,
            })),
        }
    }

    /// An error response with no correlatable id, e.g. a parse failure.
    pub fn error_with_null_id(error: JSONRPCErrorError) -> Self {
        RawMessage::Error {
            id: RawId::Null,
            error,
        }
    }

    pub fn error_response(id: RequestId, error: JSONRPCErrorError) -> Self {
        RawMessage::Error {
            id: RawId::Present(id),
            error,
        }
    }

    pub fn success_response(id: RequestId, result: Value) -> Self {
        RawMessage::Response {
            id: RawId::Present(id),
            result,
        }
    }
}

impl From<JSONRPCMessage> for RawMessage {
    fn from(msg: JSONRPCMessage) -> Self {
        match msg {
            JSONRPCMessage::Request(r) => RawMessage::Request {
                id: RawId::Present(r.id),
                method: r.method,
                params: r.params,
            },
            JSONRPCMessage::Notification(n) => RawMessage::Notification {
                method: n.method,
                params: n.params,
            },
            JSONRPCMessage::Response(r) => RawMessage::Response {
                id: RawId::Present(r.id),
                result: r.result,
            },
            JSONRPCMessage::Error(e) => RawMessage::Error {
                id: RawId::Present(e.id),
                error: e.error,
            },
        }
    }
}

/// One element of a parsed batch: either a message ready for dispatch, or an
/// element that failed to parse, already reduced to the error response it
/// will become (spec.md §8 S4: one bad element doesn't fail the batch, and
/// the caller never re-interprets it as inbound protocol traffic).
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Message(RawMessage),
    Malformed(RawMessage),
}

/// Result of [`parse`]: either a lone message or a (non-empty) batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Single(RawMessage),
    Batch(Vec<BatchEntry>),
}

/// Methods beginning with this prefix are reserved for the protocol itself
/// (spec.md §3 invariant) and always rejected with `MethodNotFound`.
const RESERVED_METHOD_PREFIX: &str = "rpc.";

pub fn parse(bytes: &[u8]) -> Result<Parsed, McpError> {
    let text = std::str::from_utf8(bytes).map_err(|_| McpError::parse_error())?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(McpError::parse_error());
    }

    if trimmed.starts_with('[') {
        let elements: Vec<Value> =
            serde_json::from_str(trimmed).map_err(|_| McpError::parse_error())?;
        if elements.is_empty() {
            return Err(McpError::invalid_request("batch must not be empty"));
        }
        let entries = elements
            .into_iter()
            .map(|element| {
                // A malformed element still echoes its `id`, if one can be
                // recovered, so a caller can correlate the failure with the
                // request that caused it (spec.md §8 S4).
                let fallback_id = best_effort_id(&element);
                match parse_value(element) {
                    Ok(message) => BatchEntry::Message(message),
                    Err(err) => BatchEntry::Malformed(RawMessage::Error {
                        id: fallback_id,
                        error: err.to_response(false),
                    }),
                }
            })
            .collect();
        Ok(Parsed::Batch(entries))
    } else {
        let value: Value = serde_json::from_str(trimmed).map_err(|_| McpError::parse_error())?;
        Ok(Parsed::Single(parse_value(value)?))
    }
}

fn best_effort_id(value: &Value) -> RawId {
    match value.as_object().and_then(|object| object.get("id")) {
        Some(id) => parse_raw_id(Some(id)).unwrap_or(RawId::Null),
        None => RawId::Null,
    }
}

fn parse_value(value: Value) -> Result<RawMessage, McpError> {
    let Value::Object(object) = value else {
        return Err(McpError::invalid_request("message must be a JSON object"));
    };
    parse_object(object)
}

fn parse_object(object: Map<String, Value>) -> Result<RawMessage, McpError> {
    match object.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        _ => return Err(McpError::invalid_request("missing or invalid `jsonrpc` field")),
    }

    if let Some(method) = object.get("method") {
        let Value::String(method) = method else {
            return Err(McpError::invalid_request("`method` must be a string"));
        };
        let method = method.clone();
        if method.starts_with(RESERVED_METHOD_PREFIX) {
            return Err(McpError::method_not_found(method));
        }
        let params = object.get("params").cloned();

        return if object.contains_key("id") {
            let id = parse_raw_id(object.get("id"))?;
            Ok(RawMessage::Request { id, method, params })
        } else {
            Ok(RawMessage::Notification { method, params })
        };
    }

    let has_result = object.contains_key("result");
    let has_error = object.contains_key("error");
    if has_result == has_error {
        return Err(McpError::invalid_request(
            "response must have exactly one of `result`/`error`",
        ));
    }

    let id = parse_raw_id(object.get("id"))?;
    if has_result {
        let result = object.get("result").cloned().unwrap_or(Value::Null);
        Ok(RawMessage::Response { id, result })
    } else {
        let error_value = object
            .get("error")
            .cloned()
            .ok_or_else(|| McpError::invalid_request("missing `error` object"))?;
        let error: JSONRPCErrorError = serde_json::from_value(error_value)
            .map_err(|_| McpError::invalid_request("malformed `error` object"))?;
        Ok(RawMessage::Error { id, error })
    }
}

fn parse_raw_id(id: Option<&Value>) -> Result<RawId, McpError> {
    match id {
        None | Some(Value::Null) => Ok(RawId::Null),
        Some(Value::String(s)) => Ok(RawId::Present(RequestId::String(s.clone()))),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(RawId::Present(RequestId::Integer(i)))
            } else {
                Err(McpError::invalid_request("id must be a finite integer"))
            }
        }
        Some(_) => Err(McpError::invalid_request(
            "id must be a string, finite number, or null",
        )),
    }
}

pub fn marshal(message: &RawMessage) -> Result<Vec<u8>, McpError> {
    serde_json::to_vec(&to_value(message))
        .map_err(|err| McpError::internal(format!("failed to marshal message: {err}")))
}

pub fn marshal_batch(messages: &[RawMessage]) -> Result<Vec<u8>, McpError> {
    if messages.is_empty() {
        return Err(McpError::invalid_request("cannot marshal an empty batch"));
    }
    if let [only] = messages {
        return marshal(only);
    }
    let values: Vec<Value> = messages.iter().map(to_value).collect();
    serde_json::to_vec(&Value::Array(values))
        .map_err(|err| McpError::internal(format!("failed to marshal batch: {err}")))
}

fn to_value(message: &RawMessage) -> Value {
    match message {
        RawMessage::Request { id, method, params } => {
            let mut object = Map::new();
            object.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
            object.insert("id".to_string(), id.to_value());
            object.insert("method".to_string(), Value::String(method.clone()));
            if let Some(params) = params {
                object.insert("params".to_string(), params.clone());
            }
            Value::Object(object)
        }
        RawMessage::Notification { method, params } => {
            let mut object = Map::new();
            object.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
            object.insert("method".to_string(), Value::String(method.clone()));
            if let Some(params) = params {
                object.insert("params".to_string(), params.clone());
            }
            Value::Object(object)
        }
        RawMessage::Response { id, result } => {
            let mut object = Map::new();
            object.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
            object.insert("id".to_string(), id.to_value());
            object.insert("result".to_string(), result.clone());
            Value::Object(object)
        }
        RawMessage::Error { id, error } => {
            let mut object = Map::new();
            object.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
            object.insert("id".to_string(), id.to_value());
            object.insert(
                "error".to_string(),
                serde_json::to_value(error).unwrap_or(Value::Null),
            );
            Value::Object(object)
        }
    }
}
