//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
///
/// `params` is kept as a raw value: the primary chain takes positional
/// arrays, the side-chain takes named objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: RpcId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object, exactly as sent by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default = "null_id")]
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

fn null_id() -> RpcId {
    RpcId::Null
}

impl JsonRpcResponse {
    /// Build a successful response (used by transports and test doubles).
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn failure(id: RpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns `true` if this is a successful response.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Unwrap the result value or return the node's rejection.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(err) => Err(RpcError::from(err)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// A method rejection reported by a node that executed the call.
///
/// `message` is the node's own text. When the node attaches a structured
/// assertion stack, the message is the top frame's format string with its
/// `${key}` placeholders filled in, which is the most specific text hived
/// produces.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    /// Always `"RPCError"`.
    pub name: String,
    pub message: String,
    /// JSON-RPC error code.
    pub code: i64,
    /// Raw `data` member of the error object.
    pub data: Option<Value>,
}

impl RpcError {
    pub const NAME: &'static str = "RPCError";

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            name: Self::NAME.into(),
            message: message.into(),
            code,
            data: None,
        }
    }

    /// The chain-level exception name (e.g. `"assert_exception"`), if reported.
    pub fn kind(&self) -> Option<&str> {
        self.data.as_ref()?.get("name")?.as_str()
    }

    /// The chain-level exception code, if reported.
    pub fn kind_code(&self) -> Option<i64> {
        self.data.as_ref()?.get("code")?.as_i64()
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<JsonRpcError> for RpcError {
    fn from(err: JsonRpcError) -> Self {
        let message = err
            .data
            .as_ref()
            .and_then(format_stack_message)
            .unwrap_or_else(|| err.message.clone());
        Self {
            name: Self::NAME.into(),
            message,
            code: err.code,
            data: err.data,
        }
    }
}

fn format_stack_message(data: &Value) -> Option<String> {
    let top = data.get("stack")?.as_array()?.first()?;
    let format = top.get("format")?.as_str()?;
    let args = top.get("data");
    Some(substitute(format, args))
}

/// Replace `${key}` placeholders with values from `args`. Unknown keys are
/// left untouched.
fn substitute(format: &str, args: Option<&Value>) -> String {
    let mut out = String::with_capacity(format.len());
    let mut rest = format;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match args.and_then(|a| a.get(key)) {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Null) | None => out.push_str(&rest[start..start + end + 3]),
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
