//! Runtime behavior for an MCP server: the codec, error taxonomy, schema
//! validator, connection registry, hook pipeline, router, async dispatcher,
//! and handshake orchestrator built on top of [`mcp_types`]'s wire format.

pub mod codec;
pub mod config;
pub mod connection;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod router;
pub mod schema;

pub use config::BackpressurePolicy;
pub use config::NegotiateVersion;
pub use config::ServerConfig;
pub use connection::Connection;
pub use connection::ConnectionRegistry;
pub use connection::ConnectionState;
pub use context::ConnectionId;
pub use context::DispatchContext;
pub use context::InitializeContext;
pub use dispatcher::Dispatcher;
pub use error::McpError;
pub use error::ToErrorResponse;
pub use hooks::HookChain;
pub use hooks::HookDecision;
pub use orchestrator::Orchestrator;
pub use router::Handler;
pub use router::Middleware;
pub use router::NotificationHandler;
pub use router::Router;
pub use schema::Validator as SchemaValidator;
