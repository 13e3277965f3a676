use serde::Deserialize;
use serde::Serialize;

use crate::CallToolRequestParams;
use crate::CallToolResult;
use crate::ClientCapabilities;
use crate::GetPromptResult;
use crate::Implementation;
use crate::JSONRPCRequest;
use crate::ListPromptsResult;
use crate::ListResourcesResult;
use crate::ListToolsResult;
use crate::ReadResourceResult;
use crate::SetLevelResult;
use crate::SubscribeResult;
use crate::UnsubscribeResult;
use crate::results::InitializeResult;

/// A request that expects a typed response, keyed by its bit-exact method
/// name (spec.md §6). Mirrors the teacher's
/// `<mcp_types::XRequest as ModelContextProtocolRequest>::Params` pattern.
pub trait ModelContextProtocolRequest {
    const METHOD: &'static str;
    type Params: Serialize + for<'de> Deserialize<'de>;
    type Result: Serialize + for<'de> Deserialize<'de>;
}

macro_rules! request_type {
    ($name:ident, $method:literal, $params:ty, $result:ty) => {
        pub struct $name;
        impl ModelContextProtocolRequest for $name {
            const METHOD: &'static str = $method;
            type Params = $params;
            type Result = $result;
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequestParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownParams {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownResult {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResourcesParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubscribeParams {
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPromptsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListToolsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLevelParams {
    pub level: String,
}

request_type!(
    InitializeRequest,
    "initialize",
    InitializeRequestParams,
    InitializeResult
);
request_type!(ShutdownRequest, "shutdown", ShutdownParams, ShutdownResult);
request_type!(
    ListResourcesRequest,
    "resources/list",
    ListResourcesParams,
    ListResourcesResult
);
request_type!(
    ReadResourceRequest,
    "resources/read",
    ReadResourceParams,
    ReadResourceResult
);
request_type!(
    SubscribeRequest,
    "resources/subscribe",
    SubscribeParams,
    SubscribeResult
);
request_type!(
    UnsubscribeRequest,
    "resources/unsubscribe",
    UnsubscribeParams,
    UnsubscribeResult
);
request_type!(
    ListPromptsRequest,
    "prompts/list",
    ListPromptsParams,
    ListPromptsResult
);
request_type!(
    GetPromptRequest,
    "prompts/get",
    GetPromptParams,
    GetPromptResult
);
request_type!(
    ListToolsRequest,
    "tools/list",
    ListToolsParams,
    ListToolsResult
);
request_type!(
    CallToolRequest,
    "tools/call",
    CallToolRequestParams,
    CallToolResult
);
request_type!(
    SetLevelRequest,
    "logging/setLevel",
    SetLevelParams,
    SetLevelResult
);

/// Every request a client may send, already parsed into its typed params.
/// Built via [`ClientRequest::try_from`] from a raw [`JSONRPCRequest`] once
/// the codec has determined the message is a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Initialize(InitializeRequestParams),
    Shutdown(ShutdownParams),
    ListResources(ListResourcesParams),
    ReadResource(ReadResourceParams),
    Subscribe(SubscribeParams),
    Unsubscribe(UnsubscribeParams),
    ListPrompts(ListPromptsParams),
    GetPrompt(GetPromptParams),
    ListTools(ListToolsParams),
    CallTool(CallToolRequestParams),
    SetLevel(SetLevelParams),
}

#[derive(Debug, thiserror::Error)]
pub enum RequestConversionError {
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("invalid params for `{method}`: {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TryFrom<JSONRPCRequest> for ClientRequest {
    type Error = RequestConversionError;

    fn try_from(request: JSONRPCRequest) -> Result<Self, Self::Error> {
        let params = request.params.unwrap_or(serde_json::Value::Null);
        let method = request.method;
        macro_rules! parse {
            ($variant:ident) => {
                serde_json::from_value(params)
                    .map(ClientRequest::$variant)
                    .map_err(|source| RequestConversionError::InvalidParams { method, source })
            };
        }
        match method.as_str() {
            InitializeRequest::METHOD => parse!(Initialize),
            ShutdownRequest::METHOD => parse!(Shutdown),
            ListResourcesRequest::METHOD => parse!(ListResources),
            ReadResourceRequest::METHOD => parse!(ReadResource),
            SubscribeRequest::METHOD => parse!(Subscribe),
            UnsubscribeRequest::METHOD => parse!(Unsubscribe),
            ListPromptsRequest::METHOD => parse!(ListPrompts),
            GetPromptRequest::METHOD => parse!(GetPrompt),
            ListToolsRequest::METHOD => parse!(ListTools),
            CallToolRequest::METHOD => parse!(CallTool),
            SetLevelRequest::METHOD => parse!(SetLevel),
            other => Err(RequestConversionError::UnknownMethod(other.to_string())),
        }
    }
}
