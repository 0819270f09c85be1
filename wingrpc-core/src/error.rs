//! Error types for wingrpc
//!
//! Two error types live here:
//!
//! - **Error**: everything a caller of the client can observe (uses thiserror)
//! - **JsonRpcErrorData**: the `error` object a server puts in a reply
//!
//! # Where Errors Stop
//!
//! Not every variant reaches application code. Transport failures are turned
//! into connection errors at the connection boundary, and `Protocol` errors
//! (undecodable inbound frames) are logged and dropped by the receive loop.
//! What crosses the client boundary is caller misuse (`NotConnected`,
//! `InvalidUrl`, `InvalidParams`), connection outcomes (`ConnectionFailed`,
//! `ConnectionClosed`, `Timeout`) and server-reported errors (`JsonRpc`).
//!
//! # Cloning
//!
//! `Error` is `Clone` because one failure is often delivered to many waiters:
//! a failed connect attempt resolves every caller awaiting it, and a dropped
//! connection rejects every pending call.
//!
//! # Examples
//!
//! ```rust
//! use wingrpc_core::{Error, JsonRpcErrorData};
//!
//! let remote = Error::JsonRpc(JsonRpcErrorData::new(-32601, "Method not found"));
//! assert!(!remote.is_connection_error());
//! assert!(Error::ConnectionClosed.is_connection_error());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for wingrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for wingrpc operations
///
/// # Error Categories
///
/// - **Connection errors**: ConnectionFailed, ConnectionClosed, WebSocket
/// - **Caller misuse**: NotConnected, InvalidUrl, InvalidParams
/// - **Protocol errors**: Protocol, Serialization
/// - **Call outcomes**: JsonRpc, Timeout
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The server answered the call with a JSON-RPC error object
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// Serialization or deserialization error
    ///
    /// Raised when params cannot be turned into JSON, or when a typed call
    /// cannot deserialize the reply's `result` into the requested type.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound frame could not be decoded into a reply
    ///
    /// Covers invalid UTF-8, invalid JSON, a missing or non-numeric `id`, and
    /// an envelope with neither `result` nor `error`.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Params were neither an array, an object, nor absent
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The URL given to `connect` is unusable
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A call was issued before any connect
    ///
    /// This is caller misuse. It is reported immediately and nothing is sent.
    #[error("Not connected: call connect() before invoking methods")]
    NotConnected,

    /// The socket could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The socket closed or errored after it was open
    ///
    /// Every call pending at that moment is rejected with this error, and
    /// calls issued afterwards fail with it until a fresh connect succeeds.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A call or connect attempt exceeded its deadline
    #[error("Request timeout")]
    Timeout,

    /// Unexpected internal failure (for example a panicked connect task)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error describes the state of the connection rather than
    /// the outcome of one particular call
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed(_) | Error::ConnectionClosed | Error::WebSocket(_)
        )
    }
}

/// JSON-RPC 2.0 error object, as carried in the `error` member of a reply
///
/// # Standard Error Codes
///
/// - `-32700`: Parse error
/// - `-32600`: Invalid Request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000 to -32099`: Server error (implementation-defined)
///
/// # Examples
///
/// ```rust
/// use wingrpc_core::JsonRpcErrorData;
///
/// let error: JsonRpcErrorData =
///     serde_json::from_str(r#"{"code":-32602,"message":"Invalid params"}"#).unwrap();
/// assert_eq!(error.code, JsonRpcErrorData::INVALID_PARAMS);
/// assert_eq!(error.to_string(), "[-32602] Invalid params");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    pub code: i32,

    /// Short human-readable description
    pub message: String,

    /// Optional server-supplied detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Invalid JSON was received by the server
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Create an error object with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error object with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Whether the code falls in the implementation-defined server range
    pub fn is_server_error(&self) -> bool {
        (-32099..=-32000).contains(&self.code)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
