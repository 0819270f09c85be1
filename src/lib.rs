//! wingrpc - JSON-RPC 2.0 over one multiplexed WebSocket
//!
//! This is the convenience crate that re-exports the wingrpc sub-crates.
//!
//! # Architecture
//!
//! - **wingrpc-core**: wire types, codec, error handling, observability
//! - **wingrpc-client**: connection lifecycle, pending calls, the client API
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wingrpc::{PageRequest, RpcClient};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::new();
//!     client.connect("ws://localhost:8765/ws").await?;
//!
//!     let hosts: wingrpc::Page<Value> = client
//!         .inventory()
//!         .list_hosts(&PageRequest::new(1, 20))
//!         .await?;
//!     println!("{} hosts", hosts.total_count);
//!
//!     let scan: Value = client.call("get_scan", ["scan-3"]).await?;
//!     println!("Scan: {}", scan);
//!     Ok(())
//! }
//! ```

pub use wingrpc_client as client;
pub use wingrpc_core as core;

pub use wingrpc_client::{ClientBuilder, ConnectionState, Page, PageRequest, RpcClient};
pub use wingrpc_core::{Error, Result};
