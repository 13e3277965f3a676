//! Wire types for the Model Context Protocol: the JSON-RPC 2.0 envelope
//! (spec.md §3 Message, §6) and the fixed MCP method vocabulary. This crate
//! only models shapes — dispatch, state machines, and validation live in
//! `mcp-core`.

mod capabilities;
mod content;
pub mod error_code;
mod message;
mod notifications;
mod request_id;
mod requests;
mod results;

pub use capabilities::ClientCapabilities;
pub use capabilities::Implementation;
pub use capabilities::PromptsCapability;
pub use capabilities::ResourcesCapability;
pub use capabilities::RootsCapability;
pub use capabilities::ServerCapabilities;
pub use capabilities::ToolsCapability;
pub use content::ContentBlock;
pub use content::TextContent;
pub use message::JSONRPC_VERSION;
pub use message::JSONRPCError;
pub use message::JSONRPCErrorError;
pub use message::JSONRPCMessage;
pub use message::JSONRPCNotification;
pub use message::JSONRPCRequest;
pub use message::JSONRPCResponse;
pub use notifications::CancelledNotification;
pub use notifications::CancelledParams;
pub use notifications::ClientNotification;
pub use notifications::ExitNotification;
pub use notifications::ExitParams;
pub use notifications::InitializedNotification;
pub use notifications::InitializedParams;
pub use notifications::ModelContextProtocolNotification;
pub use notifications::NotificationConversionError;
pub use notifications::ProgressNotification;
pub use notifications::ProgressParams;
pub use notifications::ProgressToken;
pub use notifications::PromptListChangedNotification;
pub use notifications::ResourceListChangedNotification;
pub use notifications::ToolListChangedNotification;
pub use request_id::RequestId;
pub use requests::CallToolRequest;
pub use requests::ClientRequest;
pub use requests::GetPromptParams;
pub use requests::GetPromptRequest;
pub use requests::InitializeRequest;
pub use requests::InitializeRequestParams;
pub use requests::ListPromptsParams;
pub use requests::ListPromptsRequest;
pub use requests::ListResourcesParams;
pub use requests::ListResourcesRequest;
pub use requests::ListToolsParams;
pub use requests::ListToolsRequest;
pub use requests::ModelContextProtocolRequest;
pub use requests::ReadResourceParams;
pub use requests::ReadResourceRequest;
pub use requests::RequestConversionError;
pub use requests::SetLevelParams;
pub use requests::SetLevelRequest;
pub use requests::ShutdownParams;
pub use requests::ShutdownRequest;
pub use requests::ShutdownResult;
pub use requests::SubscribeParams;
pub use requests::SubscribeRequest;
pub use requests::UnsubscribeParams;
pub use requests::UnsubscribeRequest;
pub use results::CallToolRequestParams;
pub use results::CallToolResult;
pub use results::GetPromptResult;
pub use results::InitializeResult;
pub use results::ListPromptsResult;
pub use results::ListResourcesResult;
pub use results::ListToolsResult;
pub use results::Prompt;
pub use results::PromptArgument;
pub use results::PromptMessage;
pub use results::ReadResourceResult;
pub use results::Resource;
pub use results::ResourceContents;
pub use results::SetLevelResult;
pub use results::SubscribeResult;
pub use results::Tool;
pub use results::UnsubscribeResult;

/// MCP protocol version this crate's schemas were drawn from. Servers are
/// free to negotiate a different mutually-supported version (spec.md §9
/// Open Question 2); this constant is only a sensible default to offer.
pub const MCP_SCHEMA_VERSION: &str = "2025-06-18";
