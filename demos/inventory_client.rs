//! Inventory client example
//!
//! Connects to an inventory backend, lists the first page of hosts and
//! fetches the first host in full.
//!
//! Run with: cargo run --example inventory_client -- ws://localhost:8765/ws
//!
//! Set OTEL_EXPORTER_OTLP_ENDPOINT to export traces and metrics, and
//! RUST_LOG=debug to see every frame.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use wingrpc::core::ObservabilityConfig;
use wingrpc::{Page, PageRequest, RpcClient};

#[derive(Debug, Deserialize)]
struct HostListItem {
    host_id: String,
    state: String,
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    hostnames: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8765/ws".to_string());

    let client = RpcClient::builder()
        .call_timeout(Duration::from_secs(10))
        .with_default_connect_retry()
        .with_observability(ObservabilityConfig::new("inventory-client").with_json_logs(false))
        .build();

    client.connect(&url).await?;
    println!("Connected to {}", url);

    let page: Page<HostListItem> = client
        .inventory()
        .list_hosts(&PageRequest::new(1, 10).sort_by("started", false))
        .await?;

    println!("{} hosts in total, first {}:", page.total_count, page.items.len());
    for host in &page.items {
        println!(
            "  {} [{}] {} {}",
            host.host_id,
            host.state,
            host.addresses.join(","),
            host.hostnames.join(",")
        );
    }

    if let Some(first) = page.items.first() {
        let host: Value = client.inventory().get_host(&first.host_id).await?;
        println!("\n{}", serde_json::to_string_pretty(&host)?);
    }

    client.disconnect().await;
    Ok(())
}
