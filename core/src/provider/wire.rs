//! Wire types for the tool-provider protocol
//!
//! The provider speaks JSON-RPC 2.0 over newline-delimited frames on its
//! standard streams. Responses are decoded into a discriminated success/error
//! shape at this boundary so nothing downstream inspects raw untyped fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One framed message read back from the provider.
///
/// A frame carrying `method` is a server-initiated notification or request;
/// a frame carrying `id` is the response to one of ours.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcFrame {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcFrame {
    /// Whether this frame is a server-initiated message rather than a response.
    pub fn is_notification(&self) -> bool {
        self.method.is_some()
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Outcome of one correlated request: the provider either answered with a
/// payload or with an error object.
#[derive(Debug)]
pub enum RpcOutcome {
    Success(Value),
    Failure(RpcError),
}

/// A tool advertised by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within the catalog
    pub name: String,
    /// Human-readable description the model sees
    #[serde(default)]
    pub description: String,
    /// JSON-Schema-like shape of the tool's arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Payload of a `tools/list` response
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

/// One typed segment of a tool result's content sequence
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentSegment {
    /// The segment's text, when it is a text segment.
    pub fn as_text(&self) -> Option<&str> {
        if self.kind == "text" {
            self.text.as_deref()
        } else {
            None
        }
    }
}

/// Decoded payload of a `tools/call` response
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Content segments, in provider order
    pub content: Vec<ContentSegment>,
    /// Provider-side error flag
    pub is_error: bool,
    /// The whole result, kept for the structured-data fallback rendering
    raw: Value,
}

#[derive(Debug, Deserialize)]
struct RawToolResult {
    #[serde(default)]
    content: Vec<ContentSegment>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

impl ToolOutput {
    /// Decode a `tools/call` result payload.
    pub fn from_value(raw: Value) -> serde_json::Result<Self> {
        let decoded: RawToolResult = serde_json::from_value(raw.clone())?;
        Ok(Self {
            content: decoded.content,
            is_error: decoded.is_error,
            raw,
        })
    }

    /// Normalize the output to the single string the model will see: all text
    /// segments in order, joined by a single space. When no text segment
    /// exists, fall back to the literal JSON rendering of the whole result.
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(ContentSegment::as_text)
            .collect();

        if parts.is_empty() {
            self.raw.to_string()
        } else {
            parts.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_classification() {
        let response: RpcFrame =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#).unwrap();
        assert!(!response.is_notification());
        assert_eq!(response.id, Some(3));

        let notification: RpcFrame =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#).unwrap();
        assert!(notification.is_notification());

        let error: RpcFrame = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32601,"message":"method not found"}}"#,
        )
        .unwrap();
        assert_eq!(error.error.unwrap().code, -32601);
    }

    #[test]
    fn test_tool_descriptor_decoding() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "create-contact",
            "description": "Create a contact in the CRM",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "fullname": {"type": "string"},
                    "email": {"type": "string"}
                },
                "required": ["fullname", "email"]
            }
        }))
        .unwrap();

        assert_eq!(descriptor.name, "create-contact");
        assert!(descriptor.input_schema.is_object());
    }

    #[test]
    fn test_tool_output_joins_text_segments_with_single_space() {
        let output = ToolOutput::from_value(json!({
            "content": [
                {"type": "text", "text": "Contact created"},
                {"type": "image", "data": "...", "mimeType": "image/png"},
                {"type": "text", "text": "successfully"}
            ]
        }))
        .unwrap();

        assert!(!output.is_error);
        assert_eq!(output.text(), "Contact created successfully");
    }

    #[test]
    fn test_tool_output_falls_back_to_json_rendering() {
        let raw = json!({
            "content": [{"type": "image", "data": "...", "mimeType": "image/png"}]
        });
        let output = ToolOutput::from_value(raw.clone()).unwrap();

        assert_eq!(output.text(), raw.to_string());
    }

    #[test]
    fn test_tool_output_error_flag() {
        let output = ToolOutput::from_value(json!({
            "content": [{"type": "text", "text": "duplicate email"}],
            "isError": true
        }))
        .unwrap();

        assert!(output.is_error);
        assert_eq!(output.text(), "duplicate email");
    }
}
