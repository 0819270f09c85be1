//! Typed wrappers for the inventory backend
//!
//! The backend stores network scans and the hosts found in them. Its methods
//! take their arguments positionally except `upload_scan`, which takes named
//! params:
//!
//! | method        | params                                  |
//! |---------------|-----------------------------------------|
//! | `get_host`    | `[host_id]`                             |
//! | `list_hosts`  | `[page_request]`                        |
//! | `get_scan`    | `[scan_id]`                             |
//! | `list_scans`  | `[page_request]`                        |
//! | `upload_scan` | `{"base64_data": ...}`                  |
//!
//! Records come back as whatever `T` the caller asks for; `serde_json::Value`
//! works when no schema is wanted.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wingrpc_client::{Page, PageRequest, RpcClient};
//! use serde_json::Value;
//!
//! # async fn example() -> wingrpc_client::Result<()> {
//! let client = RpcClient::new();
//! client.connect("ws://localhost:8765/ws").await?;
//!
//! let page: Page<Value> = client
//!     .inventory()
//!     .list_hosts(&PageRequest::new(1, 25).sort_by("started", false))
//!     .await?;
//! println!("{} hosts, showing {}", page.total_count, page.items.len());
//! # Ok(())
//! # }
//! ```

use crate::RpcClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wingrpc_core::Result;

/// One page of a sorted result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page index
    pub page_number: u32,
    pub items_per_page: u32,
    pub sort_column: String,
    pub sort_ascending: bool,
}

impl PageRequest {
    /// Request page `page_number` sorted ascending by `started`
    pub fn new(page_number: u32, items_per_page: u32) -> Self {
        Self {
            page_number,
            items_per_page,
            sort_column: "started".to_string(),
            sort_ascending: true,
        }
    }

    /// Sort by `column`
    pub fn sort_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.sort_column = column.into();
        self.sort_ascending = ascending;
        self
    }
}

/// A page of results plus the size of the whole set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}

/// Inventory methods on a borrowed client
#[derive(Clone, Copy)]
pub struct Inventory<'a> {
    client: &'a RpcClient,
}

impl<'a> Inventory<'a> {
    pub(crate) fn new(client: &'a RpcClient) -> Self {
        Self { client }
    }

    /// Fetch one host with its ports
    pub async fn get_host<T: DeserializeOwned>(&self, host_id: &str) -> Result<T> {
        self.client.call("get_host", [host_id]).await
    }

    /// Fetch a page of hosts
    pub async fn list_hosts<T: DeserializeOwned>(&self, page: &PageRequest) -> Result<Page<T>> {
        self.client.call("list_hosts", [page]).await
    }

    /// Fetch one scan
    pub async fn get_scan<T: DeserializeOwned>(&self, scan_id: &str) -> Result<T> {
        self.client.call("get_scan", [scan_id]).await
    }

    /// Fetch a page of scans
    pub async fn list_scans<T: DeserializeOwned>(&self, page: &PageRequest) -> Result<Page<T>> {
        self.client.call("list_scans", [page]).await
    }

    /// Upload a scan file, already base64 encoded
    pub async fn upload_scan(&self, base64_data: &str) -> Result<Value> {
        tracing::info!(bytes = base64_data.len(), "Uploading scan");
        self.client
            .call("upload_scan", json!({ "base64_data": base64_data }))
            .await
    }
}
