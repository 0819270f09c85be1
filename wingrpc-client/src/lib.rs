//! Multiplexing JSON-RPC 2.0 client over a single WebSocket
//!
//! One `RpcClient` owns one socket. Any number of tasks may issue calls on
//! it concurrently; replies are matched to their callers by call id, in
//! whatever order the server sends them.
//!
//! # Core Features
//!
//! - **Shared connect**: repeated and concurrent `connect` calls open one socket
//! - **Request-Response**: `invoke` for raw JSON, `call` for serde types
//! - **Call deadlines**: every call is bounded by a timeout, and dropping a
//!   call future cancels it
//! - **Failure handling**: losing the connection rejects every pending call
//! - **Connect retry**: optional backoff while opening the socket
//! - **Pluggable transport**: WebSocket by default, in-memory for tests
//! - **Observability**: `tracing` logs plus OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wingrpc_client::{Params, RpcClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::new();
//!     client.connect("ws://localhost:8765/ws").await?;
//!
//!     let params = Params::from_value(json!(["host-17"]))?;
//!     let host = client.invoke("get_host", params).await?;
//!     println!("Host: {}", host);
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # With Connect Retry
//!
//! ```rust,no_run
//! use wingrpc_client::{ExponentialBackoff, RpcClient};
//! use std::time::Duration;
//!
//! # async fn example() -> wingrpc_client::Result<()> {
//! let client = RpcClient::builder()
//!     .connect_timeout(Duration::from_secs(5))
//!     .with_connect_retry(Box::new(
//!         ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30))
//!             .with_max_attempts(10)
//!             .with_jitter(),
//!     ))
//!     .build();
//! client.connect("ws://localhost:8765/ws").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod client_builder;
mod connection;
mod connection_state;
mod inventory;
mod metrics;
mod request;
mod retry;
pub mod transport;

pub use client::RpcClient;
pub use client_builder::{ClientBuilder, DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};
pub use connection_state::ConnectionState;
pub use inventory::{Inventory, Page, PageRequest};
pub use metrics::{ClientMetrics, PendingGuard};
pub use retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy};
pub use transport::{
    memory_transport, Connector, FrameSink, FrameStream, MemoryConnector, MemoryListener,
    MemoryPeer, WebSocketConnector,
};
pub use wingrpc_core::{
    CallId, Error, JsonRpcErrorData, ObservabilityConfig, Params, Result,
};
