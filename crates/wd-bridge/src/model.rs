use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct NewSessionRequest {
    pub capabilities: CapabilitiesRequest,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesRequest {
    #[serde(rename = "alwaysMatch")]
    pub always_match: Value,
}

#[derive(Debug, Deserialize)]
pub struct SessionCreated {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub capabilities: Value,
}

#[derive(Debug, Serialize)]
pub struct NavigateToUrlRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ExecuteScriptRequest {
    pub script: String,
    pub args: Vec<Value>,
}

/// Every W3C response wraps its payload in `value`.
#[derive(Debug, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct WireError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl NewSessionRequest {
    pub fn new(capabilities: Value) -> Self {
        Self {
            capabilities: CapabilitiesRequest {
                always_match: capabilities,
            },
        }
    }
}
