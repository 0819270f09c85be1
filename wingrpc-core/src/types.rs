//! JSON-RPC 2.0 wire types used by the client
//!
//! The client only ever produces requests and consumes replies, so this
//! module models exactly those two shapes:
//!
//! - **Request**: `{"id": N, "method": "...", "jsonrpc": "2.0", "params": ...}`
//! - **Reply**: the `id` of the call it answers plus its outcome (a `result`
//!   value or an `error` object)
//!
//! # Call IDs
//!
//! JSON-RPC 2.0 allows string, number or null ids. This client always
//! allocates unsigned integers from a per-client counter, and a reply whose
//! id is anything else cannot belong to one of its calls. `CallId` makes that
//! restriction part of the type.
//!
//! # Params
//!
//! Params are either positional (a JSON array) or named (a JSON object).
//! A call without arguments carries no `params` member at all; it is never
//! sent as `null` or as an empty container.

use crate::error::{Error, JsonRpcErrorData, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version marker carried by every request
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifier correlating a call with its reply
///
/// Serializes transparently as a JSON number.
///
/// # Examples
///
/// ```rust
/// use wingrpc_core::CallId;
///
/// let id = CallId::from(7);
/// assert_eq!(id.to_string(), "7");
/// assert_eq!(serde_json::to_string(&id).unwrap(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl CallId {
    /// The raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CallId {
    fn from(n: u64) -> Self {
        CallId(n)
    }
}

/// Arguments of a call
///
/// # Examples
///
/// ```rust
/// use wingrpc_core::Params;
/// use serde_json::json;
///
/// let positional = Params::from_value(json!(["host-1"])).unwrap();
/// assert!(matches!(positional, Some(Params::Positional(_))));
///
/// let named = Params::from_value(json!({"base64_data": "AAAA"})).unwrap();
/// assert!(matches!(named, Some(Params::Named(_))));
///
/// // No arguments at all
/// assert!(Params::from_value(serde_json::Value::Null).unwrap().is_none());
///
/// // A bare scalar is not a valid params value
/// assert!(Params::from_value(json!(42)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// Ordered sequence of positional values
    Positional(Vec<serde_json::Value>),
    /// Mapping of named values
    Named(serde_json::Map<String, serde_json::Value>),
}

impl Params {
    /// Classify an arbitrary JSON value as call params
    ///
    /// `null` means "no params" and maps to `None`, so the request omits the
    /// `params` member. Arrays are positional, objects are named, anything
    /// else is rejected with `Error::InvalidParams`.
    pub fn from_value(value: serde_json::Value) -> Result<Option<Self>> {
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Array(values) => Ok(Some(Params::Positional(values))),
            serde_json::Value::Object(map) => Ok(Some(Params::Named(map))),
            other => Err(Error::InvalidParams(format!(
                "params must be an array or an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Serialize any value and classify the result
    ///
    /// `()` and `Option::None` serialize to `null` and therefore produce no
    /// params.
    pub fn from_serialize<P: Serialize>(params: P) -> Result<Option<Self>> {
        let value =
            serde_json::to_value(params).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_value(value)
    }

    /// Number of arguments carried
    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(map) => map.len(),
        }
    }

    /// Whether no arguments are carried
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<serde_json::Value>> for Params {
    fn from(values: Vec<serde_json::Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Params {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Params::Named(map)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// JSON-RPC 2.0 request envelope
///
/// Field order is the wire order: `id`, `method`, `jsonrpc`, `params`.
///
/// # Examples
///
/// ```rust
/// use wingrpc_core::{CallId, Request};
///
/// let request = Request::new(CallId(0), "list_scans", None);
/// assert_eq!(request.jsonrpc, "2.0");
/// assert!(request.params.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Identifier the reply will echo back
    pub id: CallId,
    /// Name of the remote operation
    pub method: String,
    /// Protocol version, always "2.0"
    pub jsonrpc: String,
    /// Arguments; omitted from the wire when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl Request {
    /// Create a request; `jsonrpc` is set to "2.0"
    pub fn new(id: CallId, method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            id,
            method: method.into(),
            jsonrpc: JSONRPC_VERSION.to_string(),
            params,
        }
    }
}

/// Outcome a server reported for one call
pub type ReplyOutcome = std::result::Result<serde_json::Value, JsonRpcErrorData>;

/// A decoded reply: the call it answers and that call's outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Id of the call this reply answers
    pub id: CallId,
    /// `Ok(result)` or the server's error object
    pub outcome: ReplyOutcome,
}

impl Reply {
    /// Successful reply
    pub fn success(id: CallId, result: serde_json::Value) -> Self {
        Self {
            id,
            outcome: Ok(result),
        }
    }

    /// Error reply
    pub fn error(id: CallId, error: JsonRpcErrorData) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    /// Whether the server reported success
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Convert into the value a caller receives
    pub fn into_result(self) -> Result<serde_json::Value> {
        self.outcome.map_err(Error::JsonRpc)
    }
}
