//! Wire types, codec and errors for the wingrpc JSON-RPC client
//!
//! This crate holds everything about the protocol that does not depend on a
//! live connection:
//!
//! - **Types**: call ids, params, the request envelope and decoded replies
//! - **Codec**: turning requests into frames and frames into replies
//! - **Error handling**: the error taxonomy shared by every wingrpc crate
//! - **Observability**: subscriber and OpenTelemetry setup for applications
//!
//! The `wingrpc-client` crate builds the connection lifecycle, the pending
//! call table and the client API on top of it.
//!
//! # Example
//!
//! ```rust
//! use wingrpc_core::{codec, CallId, Params, Request};
//! use serde_json::json;
//!
//! let params = Params::from_value(json!(["host-17"])).unwrap();
//! let frame = codec::encode_request(&Request::new(CallId(0), "get_host", params)).unwrap();
//!
//! let reply = codec::decode_reply(br#"{"id":0,"result":{"host_id":"host-17"}}"#).unwrap();
//! assert_eq!(reply.id, CallId(0));
//! assert!(frame.starts_with(br#"{"id":0,"method":"get_host""#));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result};
pub use observability::{init_observability, ObservabilityConfig, ObservabilityGuard};
pub use types::{CallId, Params, Reply, ReplyOutcome, Request, JSONRPC_VERSION};
