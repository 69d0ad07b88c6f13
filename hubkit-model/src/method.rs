use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Device method answering with the twin's desired properties
pub const GET_DESIRED_PROPERTIES: &str = "GetDesiredProperties";

/// Device method answering with the twin's reported properties
pub const GET_REPORTED_PROPERTIES: &str = "GetReportedProperties";

/// A direct method call received by the device
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRequest {
    pub name: String,
    /// Correlates the response with this request
    pub request_id: String,
    pub payload: Option<Value>,
}

/// The device's answer to a [MethodRequest]
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResponse {
    pub status: u16,
    pub payload: Option<Value>,
}

impl MethodResponse {
    pub fn ok(payload: Value) -> Self {
        Self {
            status: 200,
            payload: Some(payload),
        }
    }

    pub fn error() -> Self {
        Self {
            status: 500,
            payload: None,
        }
    }

    pub fn not_implemented() -> Self {
        Self {
            status: 501,
            payload: None,
        }
    }
}

/// A direct method call issued from the service side
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMethodInvocation {
    pub method_name: String,
    pub response_timeout_in_seconds: u64,
    pub connect_timeout_in_seconds: u64,
    pub payload: Option<Value>,
}

impl DeviceMethodInvocation {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            response_timeout_in_seconds: 30,
            connect_timeout_in_seconds: 0,
            payload: None,
        }
    }
}

/// The result of a direct method call as relayed by the hub
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodResult {
    pub status: i32,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl MethodResult {
    /// The payload as pretty JSON, empty when the device sent none
    pub fn payload_json(&self) -> String {
        self.payload
            .as_ref()
            .and_then(|p| serde_json::to_string_pretty(p).ok())
            .unwrap_or_default()
    }
}
