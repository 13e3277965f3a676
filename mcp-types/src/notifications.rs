use serde::Deserialize;
use serde::Serialize;

use crate::JSONRPCNotification;
use crate::RequestId;

pub trait ModelContextProtocolNotification {
    const METHOD: &'static str;
    type Params: Serialize + for<'de> Deserialize<'de>;
}

macro_rules! notification_type {
    ($name:ident, $method:literal, $params:ty) => {
        pub struct $name;
        impl ModelContextProtocolNotification for $name {
            const METHOD: &'static str = $method;
            type Params = $params;
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializedParams {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledParams {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `progressToken` is restricted to the same id shapes as `RequestId`
/// (spec.md's MCP schema reuses the JSON-RPC id type here).
pub type ProgressToken = RequestId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressParams {
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceListChangedParams {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolListChangedParams {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptListChangedParams {}

notification_type!(InitializedNotification, "initialized", InitializedParams);
notification_type!(ExitNotification, "exit", ExitParams);
notification_type!(
    CancelledNotification,
    "notifications/cancelled",
    CancelledParams
);
notification_type!(ProgressNotification, "notifications/progress", ProgressParams);
notification_type!(
    ResourceListChangedNotification,
    "notifications/resources/list_changed",
    ResourceListChangedParams
);
notification_type!(
    ToolListChangedNotification,
    "notifications/tools/list_changed",
    ToolListChangedParams
);
notification_type!(
    PromptListChangedNotification,
    "notifications/prompts/list_changed",
    PromptListChangedParams
);

/// Every notification a client may send, already parsed into its typed
/// params.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotification {
    Initialized(InitializedParams),
    Exit(ExitParams),
    Cancelled(CancelledParams),
    Progress(ProgressParams),
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationConversionError {
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("invalid params for `{method}`: {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    /// Spec.md §9 Open Question 3: the stricter MCP rule rejects array
    /// params for notifications even though bare JSON-RPC would allow them.
    #[error("notification params for `{0}` must be an object, not an array")]
    ArrayParamsRejected(String),
}

impl TryFrom<JSONRPCNotification> for ClientNotification {
    type Error = NotificationConversionError;

    fn try_from(notification: JSONRPCNotification) -> Result<Self, Self::Error> {
        if matches!(notification.params, Some(serde_json::Value::Array(_))) {
            return Err(NotificationConversionError::ArrayParamsRejected(
                notification.method,
            ));
        }
        let params = notification.params.unwrap_or(serde_json::Value::Null);
        let method = notification.method;
        macro_rules! parse {
            ($variant:ident) => {
                serde_json::from_value(params)
                    .map(ClientNotification::$variant)
                    .map_err(|source| NotificationConversionError::InvalidParams {
                        method,
                        source,
                    })
            };
        }
        match method.as_str() {
            InitializedNotification::METHOD => parse!(Initialized),
            ExitNotification::METHOD => parse!(Exit),
            CancelledNotification::METHOD => parse!(Cancelled),
            ProgressNotification::METHOD => parse!(Progress),
            other => Err(NotificationConversionError::UnknownMethod(other.to_string())),
        }
    }
}
