//! JSON-RPC client over a single WebSocket
//!
//! This module provides `RpcClient`, which owns one connection and
//! multiplexes any number of concurrent calls over it.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: `RpcClient::new()` or `RpcClient::builder()`; nothing is opened yet
//! 2. **Connect**: `connect(url)` opens the socket; repeated or concurrent
//!    calls share one attempt and one socket
//! 3. **Invoke**: `invoke`/`call` send a request and await the matching reply
//! 4. **Close**: `disconnect()`, or drop every clone of the client
//!
//! After the connection fails, calls fail fast until `connect` is called
//! again. Call ids keep counting up across reconnects.
//!
//! # Cloning
//!
//! `RpcClient` is cheaply cloneable. All clones share the same connection,
//! the same pending calls and the same id counter.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wingrpc_client::RpcClient;
//! use serde_json::{json, Value};
//!
//! # async fn example() -> wingrpc_client::Result<()> {
//! let client = RpcClient::new();
//! client.connect("ws://localhost:8765/ws").await?;
//!
//! let host: Value = client.call("get_host", ["host-17"]).await?;
//! let scans: Value = client.call("list_scans", [json!({
//!     "page_number": 1,
//!     "items_per_page": 20,
//!     "sort_column": "started",
//!     "sort_ascending": false,
//! })]).await?;
//! # Ok(())
//! # }
//! ```

use crate::client_builder::ClientBuilder;
use crate::connection::ConnectionManager;
use crate::connection_state::ConnectionState;
use crate::inventory::Inventory;
use crate::metrics::{call_status, ClientMetrics};
use crate::transport::parse_url;
use futures::SinkExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use wingrpc_core::{codec, CallId, Error, ObservabilityGuard, Params, Request, Result};

/// JSON-RPC client over a single WebSocket
#[derive(Clone)]
pub struct RpcClient {
    connection: Arc<ConnectionManager>,
    /// Next call id; shared by clones and never reset
    next_id: Arc<AtomicU64>,
    call_timeout: Option<Duration>,
    /// Keeps exporters installed by the builder alive as long as the client
    _observability: Option<Arc<ObservabilityGuard>>,
}

impl RpcClient {
    /// Create a client with default settings
    ///
    /// WebSocket transport, 30 second call timeout, no connect retries.
    pub fn new() -> Self {
        ClientBuilder::new().build()
    }

    /// Start configuring a client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        connection: ConnectionManager,
        call_timeout: Option<Duration>,
        observability: Option<ObservabilityGuard>,
    ) -> Self {
        Self {
            connection: Arc::new(connection),
            next_id: Arc::new(AtomicU64::new(0)),
            call_timeout,
            _observability: observability.map(Arc::new),
        }
    }

    /// Connect to a WebSocket server
    ///
    /// Idempotent: returns immediately when already connected, and joins the
    /// in-flight attempt when one is running. After a failure it opens a
    /// fresh socket.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUrl` if `url` is not a `ws://` or `wss://` URL
    /// - `Error::ConnectionFailed` if the socket could not be opened
    /// - `Error::Timeout` if opening exceeded the connect timeout
    #[tracing::instrument(skip(self), fields(url = %url))]
    pub async fn connect(&self, url: &str) -> Result<()> {
        let url = parse_url(url)?;
        self.connection.connect(url).await
    }

    /// Call `method` and wait for its result
    ///
    /// `params: None` omits the `params` member from the request. The call
    /// timeout bounds the whole call, including any wait for a connect
    /// that is still in progress.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` if `connect` was never called; nothing is sent
    /// - the recorded connection error if the connection has failed
    /// - `Error::JsonRpc` if the server answered with an error object
    /// - `Error::Timeout` if the connect or the reply did not arrive in time
    /// - `Error::ConnectionClosed` if the connection dropped while waiting
    pub async fn invoke(&self, method: &str, params: Option<Params>) -> Result<Value> {
        self.dispatch(method, params, self.call_timeout).await
    }

    /// Like `invoke`, with a timeout for this call only
    pub async fn invoke_with_timeout(
        &self,
        method: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<Value> {
        self.dispatch(method, params, Some(timeout)).await
    }

    /// Typed call
    ///
    /// `params` is serialized first: sequences become positional params,
    /// maps and structs become named params, and `()` sends none.
    ///
    /// # Errors
    ///
    /// Everything `invoke` can return, plus `Error::InvalidParams` for scalar
    /// params and `Error::Serialization` if the result does not fit `R`.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = Params::from_serialize(params)?;
        let result = self.invoke(method, params).await?;
        serde_json::from_value(result).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Typed access to the inventory backend's methods
    pub fn inventory(&self) -> Inventory<'_> {
        Inventory::new(self)
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Whether calls can be sent right now
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of calls awaiting a reply
    pub fn pending_calls(&self) -> usize {
        self.connection.pending().len()
    }

    /// Close the connection and reject all pending calls
    ///
    /// The client returns to `Disconnected`; calls fail with
    /// `Error::NotConnected` until `connect` is called again.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    #[tracing::instrument(
        name = "invoke",
        skip_all,
        fields(method = %method, call_id = tracing::field::Empty)
    )]
    async fn dispatch(
        &self,
        method: &str,
        params: Option<Params>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let started = Instant::now();

        // The deadline covers waiting for a connect in progress as well as
        // the send and the reply.
        let exchange = self.send_and_wait(method, params);
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(Error::Timeout)),
            None => exchange.await,
        };
        let elapsed = started.elapsed();

        if let Some(m) = self.connection.metrics() {
            m.record_call(method, call_status(&result), elapsed.as_secs_f64());
        }

        match &result {
            Ok(_) => tracing::debug!(
                duration_ms = elapsed.as_millis() as u64,
                "Call completed"
            ),
            Err(e) => tracing::warn!(error = %e, "Call failed"),
        }

        result
    }

    async fn send_and_wait(&self, method: &str, params: Option<Params>) -> Result<Value> {
        self.connection.ready().await?;

        let sink = self.connection.sink()?;
        let mut call = {
            // Ids are taken under the sink lock so they reach the wire in
            // increasing order.
            let mut writer = sink.lock().await;

            let id = CallId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let frame = codec::encode_request(&Request::new(id, method, params))?;

            // Registered before sending; dropping `call` on any early return
            // removes the entry.
            let call = self.connection.pending().register(id);
            tracing::Span::current().record("call_id", call.id().get());

            if tracing::enabled!(Level::DEBUG) {
                tracing::debug!(frame = %codec::frame_text(&frame), "Sending frame");
            }
            writer.send(frame).await.map_err(|e| {
                tracing::warn!(error = %e, "Failed to send frame");
                Error::ConnectionClosed
            })?;
            call
        };

        let _pending = self.connection.metrics().map(ClientMetrics::track_pending);
        call.wait().await
    }
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory_transport;
    use serde_json::json;

    #[tokio::test]
    async fn test_new_client_is_disconnected() {
        let client = RpcClient::new();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_invoke_before_connect() {
        let (connector, _listener) = memory_transport();
        let opens = connector.clone();
        let client = RpcClient::builder().with_connector(connector).build();

        assert!(matches!(
            client.invoke("list_scans", None).await,
            Err(Error::NotConnected)
        ));
        assert_eq!(opens.opened(), 0);
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let client = RpcClient::new();
        assert!(matches!(
            client.connect("http://localhost:1/").await,
            Err(Error::InvalidUrl(_))
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_ids_start_at_zero_and_increase() {
        let (connector, mut listener) = memory_transport();
        let client = RpcClient::builder().with_connector(connector).build();

        let server = tokio::spawn(async move {
            let mut peer = listener.accept_next().await.unwrap();
            let mut seen = Vec::new();
            for _ in 0..3 {
                let request = peer.recv_request().await.unwrap();
                seen.push(request.id);
                peer.reply(request.id, json!(null)).await.unwrap();
            }
            seen
        });

        client.connect("ws://memory/").await.unwrap();
        for _ in 0..3 {
            client.invoke("ping", None).await.unwrap();
        }

        assert_eq!(server.await.unwrap(), vec![CallId(0), CallId(1), CallId(2)]);
    }

    #[tokio::test]
    async fn test_call_with_scalar_params_is_rejected_locally() {
        let (connector, mut listener) = memory_transport();
        let client = RpcClient::builder().with_connector(connector).build();

        let server = tokio::spawn(async move { listener.accept_next().await.unwrap() });
        client.connect("ws://memory/").await.unwrap();
        let _peer = server.await.unwrap();

        let result: Result<Value> = client.call("get_host", 42).await;
        assert!(matches!(result, Err(Error::InvalidParams(_))));
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_connection_and_counter() {
        let (connector, mut listener) = memory_transport();
        let client = RpcClient::builder().with_connector(connector).build();
        let clone = client.clone();

        let server = tokio::spawn(async move {
            let mut peer = listener.accept_next().await.unwrap();
            let first = peer.recv_request().await.unwrap();
            peer.reply(first.id, json!(1)).await.unwrap();
            let second = peer.recv_request().await.unwrap();
            peer.reply(second.id, json!(2)).await.unwrap();
            (first.id, second.id)
        });

        client.connect("ws://memory/").await.unwrap();
        assert!(clone.is_connected());

        client.invoke("a", None).await.unwrap();
        clone.invoke("b", None).await.unwrap();

        assert_eq!(server.await.unwrap(), (CallId(0), CallId(1)));
    }
}
