//! Socket abstraction
//!
//! A `Connector` opens one physical connection and hands back its two
//! halves: a sink that accepts outbound frames and a stream that yields
//! inbound ones. The client never sees anything below frames; pings,
//! close handshakes and framing belong to the backend.
//!
//! Backends:
//!
//! - **WebSocketConnector**: `tokio-tungstenite` client, the production path
//! - **MemoryConnector**: in-process channels, for tests and embedding

use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;
use url::Url;
use wingrpc_core::{Error, Result};

pub mod memory;
pub mod websocket;

pub use memory::{memory_transport, Handshake, MemoryConnector, MemoryListener, MemoryPeer};
pub use websocket::WebSocketConnector;

/// Outbound half of a connection
///
/// Closing the sink closes the connection.
pub type FrameSink = Pin<Box<dyn Sink<Vec<u8>, Error = Error> + Send>>;

/// Inbound half of a connection
///
/// Ends when the peer closes. An `Err` item means the connection broke.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Opens connections for a client
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open one physical connection to `url`
    ///
    /// # Errors
    ///
    /// `Error::ConnectionFailed` when the peer cannot be reached or refuses
    /// the handshake.
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream)>;
}

/// Parse a connect URL, accepting only `ws` and `wss`
///
/// # Examples
///
/// ```rust
/// use wingrpc_client::transport::parse_url;
///
/// assert!(parse_url("ws://localhost:8765/ws").is_ok());
/// assert!(parse_url("http://localhost:8765/").is_err());
/// assert!(parse_url("not a url").is_err());
/// ```
pub fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

    match parsed.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(Error::InvalidUrl(format!(
                "{}: unsupported scheme '{}', expected ws or wss",
                url, other
            )))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidUrl(format!("{}: missing host", url)));
    }

    Ok(parsed)
}
