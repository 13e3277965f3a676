//! Handshake orchestrator (C8): the single façade transports call.
//!
//! `handle_message` implements spec.md §4.8's algorithm directly — no
//! hidden request-id-keyed map bridges `BeforeInitialize`/`AfterInitialize`
//! (REDESIGN FLAGS item 2); the parsed params and built result are just
//! local variables threaded through one function, and the only thing
//! carried forward into the connection's own state is the
//! [`crate::context::InitializeContext`] token handed to
//! [`crate::connection::Connection::complete_handshake`].

use std::sync::Arc;

use mcp_types::Implementation;
use mcp_types::InitializeRequestParams;
use mcp_types::InitializeResult;
use mcp_types::RequestId;
use mcp_types::ServerCapabilities;
use serde_json::Value;
use serde_json::json;

use crate::codec;
use crate::codec::BatchEntry;
use crate::codec::Parsed;
use crate::codec::RawMessage;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::connection::ConnectionRegistry;
use crate::connection::ConnectionState;
use crate::context::ConnectionId;
use crate::context::DispatchContext;
use crate::context::InitializeContext;
use crate::dispatcher::Dispatcher;
use crate::error::McpError;
use crate::hooks::HookChain;
use crate::hooks::HookDecision;
use crate::router::Router;
use crate::schema;

/// Everything a transport needs to drive one MCP session end to end.
pub struct Orchestrator {
    connections: ConnectionRegistry,
    hooks: HookChain,
    dispatcher: Dispatcher,
    validator: schema::Validator,
    config: ServerConfig,
    server_info: Implementation,
    server_capabilities: ServerCapabilities,
}

impl Orchestrator {
    pub fn new(
        router: Arc<Router>,
        hooks: HookChain,
        config: ServerConfig,
        server_info: Implementation,
        server_capabilities: ServerCapabilities,
    ) -> Self {
        let connections = ConnectionRegistry::new(config.handshake_timeout);
        let validator = if config.validate_schemas {
            schema::Validator::enabled()
        } else {
            schema::Validator::disabled()
        };
        let dispatcher = Dispatcher::new(router, &config);
        Self {
            connections,
            hooks,
            dispatcher,
            validator,
            config,
            server_info,
            server_capabilities,
        }
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Registers a new, fresh (`New`-state) connection under `id`.
    pub fn open_connection(&self, id: impl Into<String>) -> Result<Arc<Connection>, crate::connection::DuplicateConnection> {
        self.connections.create(id)
    }

    /// Cancels every in-flight request bound to `id` (spec.md §4.4, §5
    /// cancellation signal (a)) before tearing down the connection itself.
    pub async fn close_connection(&self, id: &str) {
        self.dispatcher.cancel_connection(&ConnectionId::new(id));
        self.connections.remove(id).await;
    }

    /// The single entry point transports call with one raw inbound message
    /// (or batch). Returns the bytes to write back, or `None` if nothing
    /// should be sent (a lone notification, or a batch of only
    /// notifications; spec.md §8 invariant 6).
    pub async fn handle_message(&self, connection_id: Option<ConnectionId>, raw: &[u8]) -> Option<Vec<u8>> {
        if raw.len() > self.config.max_message_size {
            let err = McpError::invalid_request("message exceeds the configured maximum size");
            return Some(codec::marshal(&RawMessage::error_with_null_id(err.to_response(self.config.redact_errors))).ok()?);
        }

        let connection = match &connection_id {
            Some(id) => match self.connections.get(id.as_str()) {
                Some(connection) => Some(connection),
                None => {
                    let err = McpError::connection_error("connection not found");
                    return Some(
                        codec::marshal(&RawMessage::error_with_null_id(err.to_response(self.config.redact_errors))).ok()?,
                    );
                }
            },
            None => {
                tracing::warn!("handle_message invoked without a connection id; falling back to detached dispatch");
                None
            }
        };

        let parsed = match codec::parse(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Some(
                    codec::marshal(&RawMessage::error_with_null_id(err.to_response(self.config.redact_errors))).ok()?,
                );
            }
        };

        match parsed {
            Parsed::Single(message) => {
                let response = self.process_one(connection.as_ref(), message).await?;
                codec::marshal(&response).ok()
            }
            Parsed::Batch(entries) => {
                let mut responses = Vec::new();
                for entry in entries {
                    match entry {
                        BatchEntry::Malformed(response) => responses.push(response),
                        BatchEntry::Message(message) => {
                            if let Some(response) = self.process_one(connection.as_ref(), message).await {
                                responses.push(response);
                            }
                        }
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    codec::marshal_batch(&responses).ok()
                }
            }
        }
    }

    async fn process_one(&self, connection: Option<&Arc<Connection>>, message: RawMessage) -> Option<RawMessage> {
        match message {
            RawMessage::Request { id, method, params } => {
                self.process_request(connection, id.into_request_id(), method, params).await
            }
            RawMessage::Notification { method, params } => {
                self.process_notification(connection, method, params).await;
                None
            }
            RawMessage::Response { .. } | RawMessage::Error { .. } => {
                tracing::warn!("dropping inbound response/error: no server-initiated request to correlate it with");
                None
            }
        }
    }

    async fn process_request(
        &self,
        connection: Option<&Arc<Connection>>,
        request_id: Option<RequestId>,
        method: String,
        params: Option<Value>,
    ) -> Option<RawMessage> {
        let redact = self.config.redact_errors;
        let Some(request_id) = request_id else {
            let err = McpError::invalid_request("request id must not be null");
            return Some(RawMessage::error_with_null_id(err.to_response(redact)));
        };

        // No connection id: fall back to base router handling, bypassing the
        // handshake gate entirely (spec.md §4.8 step 1 — used by test
        // harnesses that drive the router directly).
        if let Some(connection) = connection {
            if method != "initialize" {
                let state = connection.state().await;
                if state == ConnectionState::Closed {
                    // A closed connection (e.g. handshake timeout) is a
                    // connection-lifecycle fault (spec.md §7 category 6),
                    // not a plain not-yet-initialized gate rejection.
                    let err = McpError::connection_error("connection is closed");
                    return Some(RawMessage::error_response(request_id, err.to_response(redact)));
                }
                if state != ConnectionState::Ready {
                    let err = McpError::not_initialized(state.name(), method.clone());
                    return Some(RawMessage::error_response(request_id, err.to_response(redact)));
                }
            }
        } else {
            tracing::warn!(method, "dispatching without a bound connection id");
        }

        let raw_value = json!({ "id": request_id.to_string(), "method": method, "params": params });
        if let HookDecision::Reject(err) = self.hooks.run_before_any(Some(&request_id), &method, &raw_value).await {
            return Some(RawMessage::error_response(request_id, err.to_response(redact)));
        }

        if let Some(kind) = schema::Validator::params_kind_for_method(&method) {
            let payload = params.clone().unwrap_or(Value::Null);
            if let Err(err) = self.validator.validate(kind, &payload) {
                return Some(RawMessage::error_response(request_id, err.to_response(redact)));
            }
        }

        if method == "initialize" {
            return Some(self.handle_initialize(connection, request_id, params).await);
        }

        let connection_id = connection.map(|connection| ConnectionId::new(connection.id()));
        let ctx = DispatchContext::new(connection_id.clone());
        let result = self
            .dispatcher
            .dispatch(ctx, connection_id, request_id.clone(), method.clone(), params)
            .await;

        match result {
            Ok(value) => {
                self.hooks.run_on_success(Some(&request_id), &method, &value).await;
                Some(RawMessage::success_response(request_id, value))
            }
            Err(err) => {
                self.hooks.run_on_error(Some(&request_id), &method, &err).await;
                Some(RawMessage::error_response(request_id, err.to_response(redact)))
            }
        }
    }

    async fn handle_initialize(&self, connection: Option<&Arc<Connection>>, request_id: RequestId, params: Option<Value>) -> RawMessage {
        let redact = self.config.redact_errors;
        let Some(connection) = connection else {
            let err = McpError::connection_error("initialize requires a bound connection");
            return RawMessage::error_response(request_id, err.to_response(redact));
        };

        let params_value = params.clone().unwrap_or(Value::Null);
        let init_params: InitializeRequestParams = match serde_json::from_value(params_value.clone()) {
            Ok(params) => params,
            Err(source) => {
                let err = McpError::invalid_params("initialize", None, source.to_string());
                return RawMessage::error_response(request_id, err.to_response(redact));
            }
        };

        let connection_for_timeout = Arc::clone(connection);
        if let Err(handshake_err) = connection
            .start_handshake(move || {
                tracing::warn!(connection = connection_for_timeout.id(), "handshake timed out");
            })
            .await
        {
            let err = McpError::connection_error(format!("cannot start handshake: {handshake_err}"));
            return RawMessage::error_response(request_id, err.to_response(redact));
        }

        self.hooks.run_before_initialize(&request_id, &params_value).await;

        let negotiated_version = self.config.negotiate_version.negotiate(&init_params.protocol_version);
        let result = InitializeResult {
            protocol_version: negotiated_version.clone(),
            capabilities: self.server_capabilities.clone(),
            server_info: self.server_info.clone(),
            instructions: None,
        };
        let result_value = serde_json::to_value(&result).unwrap_or(Value::Null);

        let initialize_ctx = InitializeContext {
            protocol_version: negotiated_version,
            client_info: init_params.client_info,
        };
        if let Err(handshake_err) = connection.complete_handshake(initialize_ctx).await {
            // The handshake timer already fired, or some other racer moved
            // the connection out of Initializing. We still answer this
            // request (spec.md §4.8 step 6), but the connection is
            // effectively closed — the next request is rejected with
            // `-32001` by the gating check above.
            tracing::warn!("complete_handshake did not apply: {handshake_err}");
        }

        self.hooks.run_after_initialize(&request_id, &params_value, &result_value).await;

        RawMessage::success_response(request_id, result_value)
    }

    async fn process_notification(&self, connection: Option<&Arc<Connection>>, method: String, params: Option<Value>) {
        let raw_value = json!({ "method": method, "params": params });
        if let HookDecision::Reject(err) = self.hooks.run_before_any(None, &method, &raw_value).await {
            tracing::debug!(method, %err, "notification rejected by before_any hook");
            return;
        }

        if method == "notifications/cancelled" {
            let Some(params) = params else {
                tracing::warn!("notifications/cancelled missing params; dropping");
                return;
            };
            match serde_json::from_value::<mcp_types::CancelledParams>(params) {
                Ok(cancelled) => {
                    let connection_id = connection.map(|connection| ConnectionId::new(connection.id()));
                    self.dispatcher.cancel(connection_id.as_ref(), &cancelled.request_id);
                }
                Err(source) => tracing::warn!(%source, "malformed notifications/cancelled params"),
            }
            return;
        }

        let connection_id = connection.map(|connection| ConnectionId::new(connection.id()));
        let ctx = DispatchContext::new(connection_id);
        self.dispatcher.router().handle_notification(&ctx, &method, params).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::router::Handler;
    use crate::router::HandlerResult;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn server_identity() -> (Implementation, ServerCapabilities) {
        (
            Implementation {
                name: "test-server".to_string(),
                title: None,
                version: "0.0.0".to_string(),
            },
            ServerCapabilities::default(),
        )
    }

    struct ListTools;

    #[async_trait::async_trait]
    impl Handler for ListTools {
        async fn call(&self, _ctx: &DispatchContext, _method: &str, _params: Option<Value>) -> HandlerResult {
            Ok(json!({ "tools": [] }))
        }
    }

    fn orchestrator_with_tools_handler() -> Orchestrator {
        let router = Router::new();
        router.register("tools/list", Arc::new(ListTools)).unwrap();
        let (server_info, capabilities) = server_identity();
        Orchestrator::new(Arc::new(router), HookChain::new(), ServerConfig::new(), server_info, capabilities)
    }

    fn initialize_bytes(id: i64) -> Vec<u8> {
        format!(
            r#"{{"jsonrpc":"2.0","id":{id},"method":"initialize","params":{{"protocolVersion":"1.0","capabilities":{{}},"clientInfo":{{"name":"t","version":"0"}}}}}}"#
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn s1_happy_handshake_then_call() {
        let orchestrator = orchestrator_with_tools_handler();
        orchestrator.open_connection("c1").unwrap();

        let response = orchestrator
            .handle_message(Some(ConnectionId::new("c1")), &initialize_bytes(1))
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], json!(1));
        assert!(value["result"]["protocolVersion"].is_string());
        assert!(value["result"]["serverInfo"].is_object());
        assert!(orchestrator.connections().is_ready("c1").await);

        let call = br#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
        let response = orchestrator.handle_message(Some(ConnectionId::new("c1")), call).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], json!(2));
        assert_eq!(value["result"]["tools"], json!([]));
    }

    #[tokio::test]
    async fn s2_pre_handshake_rejection() {
        let orchestrator = orchestrator_with_tools_handler();
        orchestrator.open_connection("c2").unwrap();

        let call = br#"{"jsonrpc":"2.0","id":"x","method":"tools/list"}"#;
        let response = orchestrator.handle_message(Some(ConnectionId::new("c2")), call).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], json!("x"));
        assert_eq!(value["error"]["code"], json!(-32001));
        assert_eq!(value["error"]["data"]["state"], json!("New"));
        assert_eq!(value["error"]["data"]["method"], json!("tools/list"));
        assert_eq!(orchestrator.connections().get("c2").unwrap().state().await.name(), "New");
    }

    #[tokio::test]
    async fn s4_batch_with_mixed_content() {
        let orchestrator = orchestrator_with_tools_handler();
        let router = orchestrator.dispatcher().router();
        // reuse a second router-registered connection that is already Ready
        // to exercise the batch path against `tools/list`-shaped methods.
        let _ = router;
        orchestrator.open_connection("c4").unwrap();
        orchestrator
            .handle_message(Some(ConnectionId::new("c4")), &initialize_bytes(0))
            .await
            .unwrap();

        let batch = br#"[{"jsonrpc":"2.0","method":"tools/list","id":1},
            {"jsonrpc":"2.0","method":"notify"},
            {"jsonrpc":"1.0","method":"bad","id":2},
            {"jsonrpc":"2.0","method":"tools/list","id":3}]"#;
        let response = orchestrator.handle_message(Some(ConnectionId::new("c4")), batch).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array[0]["id"], json!(1));
        assert!(array[0].get("result").is_some());
        assert_eq!(array[1]["id"], json!(2));
        assert_eq!(array[1]["error"]["code"], json!(-32600));
        assert_eq!(array[2]["id"], json!(3));
        assert!(array[2].get("result").is_some());
    }

    #[tokio::test]
    async fn s5_parse_error_has_null_id() {
        let orchestrator = orchestrator_with_tools_handler();
        orchestrator.open_connection("c5").unwrap();

        let response = orchestrator
            .handle_message(Some(ConnectionId::new("c5")), br#"{"jsonrpc":"2.0","method":"#)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], json!(-32700));
        assert_eq!(value["error"]["message"], json!("Parse error"));
    }

    #[tokio::test]
    async fn unknown_connection_is_reported() {
        let orchestrator = orchestrator_with_tools_handler();
        let response = orchestrator
            .handle_message(Some(ConnectionId::new("missing")), br#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], json!(-32002));
    }

    #[tokio::test]
    async fn detached_context_bypasses_handshake_gate() {
        let orchestrator = orchestrator_with_tools_handler();

        let call = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let response = orchestrator.handle_message(None, call).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], json!(1));
        assert_eq!(value["result"]["tools"], json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn s3_handshake_timeout_then_subsequent_request_is_connection_error() {
        let config = ServerConfig::new().with_handshake_timeout(std::time::Duration::from_millis(50));
        let router = Router::new();
        router.register("tools/list", Arc::new(ListTools)).unwrap();
        let (server_info, capabilities) = server_identity();
        let orchestrator = Orchestrator::new(Arc::new(router), HookChain::new(), config, server_info, capabilities);
        let connection = orchestrator.open_connection("c3").unwrap();

        // Arms the handshake timer without ever completing it, simulating a
        // client that sent `initialize` but the handshake never resolves.
        connection.start_handshake(|| {}).await.unwrap();

        tokio::time::advance(std::time::Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(connection.state().await, ConnectionState::Closed);

        let call = br#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
        let response = orchestrator.handle_message(Some(ConnectionId::new("c3")), call).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], json!(2));
        assert_eq!(value["error"]["code"], json!(-32002));
    }

    #[tokio::test]
    async fn lone_notification_produces_no_response() {
        let orchestrator = orchestrator_with_tools_handler();
        orchestrator.open_connection("c6").unwrap();
        orchestrator
            .handle_message(Some(ConnectionId::new("c6")), &initialize_bytes(0))
            .await
            .unwrap();

        let response = orchestrator
            .handle_message(Some(ConnectionId::new("c6")), br#"{"jsonrpc":"2.0","method":"notifications/progress","params":{"progressToken":1,"progress":0.5}}"#)
            .await;
        assert!(response.is_none());
    }
}
