use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A single piece of tool/resource output content. MCP defines more variants
/// (image, audio, embedded resource); only the text variant is modeled here,
/// since it is the only one the core's handler contract (spec.md §6)
/// requires to exist at the type level. A handler that needs a richer shape
/// builds it as plain `Value` and returns it through `CallToolResult`
/// directly rather than through this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text(TextContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}
