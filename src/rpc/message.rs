//! JSON-RPC 2.0 wire messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Identifier correlating a request with its response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

/// Error object carried by a failed response.
#[derive(Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} ({code})")]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Unhandled method {method}"),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

/// Failure to decode an inbound frame.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid message: {0}")]
    Invalid(&'static str),
}

/// A decoded JSON-RPC message.
///
/// `params` is `Value::Null` when the message carries none.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },
    Notification {
        method: String,
        params: Value,
    },
    Response {
        id: Option<RequestId>,
        result: Result<Value, ResponseError>,
    },
}

#[derive(Deserialize)]
struct RawMessage {
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ResponseError>,
}

impl Message {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let raw: RawMessage = serde_json::from_str(text)?;
        if raw.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return Err(MessageError::Invalid("missing or unsupported jsonrpc version"));
        }
        let params = raw.params.unwrap_or(Value::Null);
        match (raw.method, raw.id) {
            (Some(method), Some(id)) => Ok(Self::Request { id, method, params }),
            (Some(method), None) => Ok(Self::Notification { method, params }),
            (None, id) => {
                let result = match (raw.error, raw.result) {
                    (Some(error), _) => Err(error),
                    (None, Some(result)) => Ok(result),
                    (None, None) if id.is_some() => Ok(Value::Null),
                    (None, None) => {
                        return Err(MessageError::Invalid(
                            "message is neither request, notification nor response",
                        ));
                    }
                };
                Ok(Self::Response { id, result })
            }
        }
    }

    /// Encode the message as a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_value()?)
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut object = Map::new();
        object.insert("jsonrpc".into(), Value::from(JSONRPC_VERSION));
        match self {
            Self::Request { id, method, params } => {
                object.insert("id".into(), serde_json::to_value(id)?);
                object.insert("method".into(), Value::from(method.as_str()));
                if !params.is_null() {
                    object.insert("params".into(), params.clone());
                }
            }
            Self::Notification { method, params } => {
                object.insert("method".into(), Value::from(method.as_str()));
                if !params.is_null() {
                    object.insert("params".into(), params.clone());
                }
            }
            Self::Response { id, result } => {
                object.insert("id".into(), serde_json::to_value(id)?);
                match result {
                    Ok(value) => object.insert("result".into(), value.clone()),
                    Err(error) => object.insert("error".into(), serde_json::to_value(error)?),
                };
            }
        }
        Ok(Value::Object(object))
    }
}
