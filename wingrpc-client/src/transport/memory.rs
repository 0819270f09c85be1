//! In-process transport
//!
//! `memory_transport()` returns a connected pair: a `MemoryConnector` to hand
//! to a client and a `MemoryListener` for the other side. Every `open` on the
//! connector shows up at the listener as a `Handshake`, and the open does not
//! complete until the listener accepts or rejects it. That makes the timing
//! of a connect attempt fully controllable.
//!
//! ```rust
//! use wingrpc_client::transport::memory_transport;
//! use wingrpc_client::RpcClient;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> wingrpc_client::Result<()> {
//! let (connector, mut listener) = memory_transport();
//! let client = RpcClient::builder().with_connector(connector).build();
//!
//! let server = tokio::spawn(async move {
//!     let mut peer = listener.accept_next().await.unwrap();
//!     let request = peer.recv_request().await.unwrap();
//!     peer.reply(request.id, json!("pong")).await.unwrap();
//! });
//!
//! client.connect("ws://memory/").await?;
//! assert_eq!(client.invoke("ping", None).await?, json!("pong"));
//! # server.await.unwrap();
//! # Ok(())
//! # }
//! ```

use super::{Connector, FrameSink, FrameStream};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc as queue, oneshot};
use url::Url;
use wingrpc_core::{CallId, Error, JsonRpcErrorData, Request, Result};

const CHANNEL_CAPACITY: usize = 64;

type Accepted = std::result::Result<(FrameSink, FrameStream), String>;

/// Create a connector and the listener that serves it
pub fn memory_transport() -> (MemoryConnector, MemoryListener) {
    let (tx, rx) = queue::unbounded_channel();
    let connector = MemoryConnector {
        handshakes: tx,
        opened: Arc::new(AtomicUsize::new(0)),
    };
    (connector, MemoryListener { handshakes: rx })
}

/// Client side of the in-process transport
#[derive(Clone)]
pub struct MemoryConnector {
    handshakes: queue::UnboundedSender<Handshake>,
    opened: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Number of physical opens attempted so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        let (reply, accepted) = oneshot::channel();
        self.handshakes
            .send(Handshake {
                url: url.clone(),
                reply,
            })
            .map_err(|_| Error::ConnectionFailed(format!("{}: listener is gone", url)))?;

        match accepted.await {
            Ok(Ok(halves)) => Ok(halves),
            Ok(Err(reason)) => Err(Error::ConnectionFailed(reason)),
            Err(_) => Err(Error::ConnectionFailed(format!(
                "{}: handshake abandoned",
                url
            ))),
        }
    }
}

/// Server side of the in-process transport
pub struct MemoryListener {
    handshakes: queue::UnboundedReceiver<Handshake>,
}

impl MemoryListener {
    /// Wait for the next open attempt
    ///
    /// Returns `None` once every connector clone has been dropped.
    pub async fn next_open(&mut self) -> Option<Handshake> {
        self.handshakes.recv().await
    }

    /// Wait for the next open attempt and accept it
    pub async fn accept_next(&mut self) -> Option<MemoryPeer> {
        self.next_open().await.map(Handshake::accept)
    }
}

/// An open attempt waiting for the listener's decision
///
/// Dropping it fails the attempt.
pub struct Handshake {
    url: Url,
    reply: oneshot::Sender<Accepted>,
}

impl Handshake {
    /// URL the client is connecting to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Complete the open and return the server end of the connection
    pub fn accept(self) -> MemoryPeer {
        let (to_server, from_client) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let (to_client, from_server) = mpsc::channel::<Result<Vec<u8>>>(CHANNEL_CAPACITY);

        let sink: FrameSink = Box::pin(to_server.sink_map_err(|_| Error::ConnectionClosed));
        let stream: FrameStream = Box::pin(from_server);

        // The connector may have given up (connect timeout); the peer is
        // then simply never heard from.
        let _ = self.reply.send(Ok((sink, stream)));

        MemoryPeer {
            incoming: from_client,
            outgoing: to_client,
        }
    }

    /// Fail the open with `reason`
    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.reply.send(Err(reason.into()));
    }
}

/// Server end of an accepted in-memory connection
///
/// Dropping it (or calling `close`) ends the client's inbound stream.
pub struct MemoryPeer {
    incoming: mpsc::Receiver<Vec<u8>>,
    outgoing: mpsc::Sender<Result<Vec<u8>>>,
}

impl MemoryPeer {
    /// Next frame sent by the client, or `None` once the client closed
    pub async fn recv_frame(&mut self) -> Option<Vec<u8>> {
        self.incoming.next().await
    }

    /// Next frame sent by the client, parsed as a request
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` when the client closed, `Error::Protocol`
    /// when the frame is not a request.
    pub async fn recv_request(&mut self) -> Result<Request> {
        let frame = self.recv_frame().await.ok_or(Error::ConnectionClosed)?;
        serde_json::from_slice(&frame).map_err(|e| Error::Protocol(e.to_string()))
    }

    /// Deliver raw bytes to the client
    pub async fn send_frame(&mut self, frame: impl Into<Vec<u8>>) -> Result<()> {
        self.outgoing
            .send(Ok(frame.into()))
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Deliver a success reply for `id`
    pub async fn reply(&mut self, id: CallId, result: serde_json::Value) -> Result<()> {
        let frame = json!({"jsonrpc": "2.0", "id": id, "result": result});
        self.send_frame(frame.to_string()).await
    }

    /// Deliver an error reply for `id`
    pub async fn reply_error(&mut self, id: CallId, error: JsonRpcErrorData) -> Result<()> {
        let frame = json!({"jsonrpc": "2.0", "id": id, "error": error});
        self.send_frame(frame.to_string()).await
    }

    /// Break the connection with a transport error
    pub async fn send_error(mut self, error: Error) {
        let _ = self.outgoing.send(Err(error)).await;
    }

    /// Close the connection cleanly
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("ws://memory/").unwrap()
    }

    #[tokio::test]
    async fn test_accepted_open_carries_frames_both_ways() {
        let (connector, mut listener) = memory_transport();

        let open = tokio::spawn(async move { connector.open(&url()).await });
        let handshake = listener.next_open().await.unwrap();
        assert_eq!(handshake.url().as_str(), "ws://memory/");
        let mut peer = handshake.accept();

        let (mut sink, mut stream) = open.await.unwrap().unwrap();

        sink.send(b"hello".to_vec()).await.unwrap();
        assert_eq!(peer.recv_frame().await.unwrap(), b"hello".to_vec());

        peer.send_frame("world").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), b"world".to_vec());
    }

    #[tokio::test]
    async fn test_rejected_open_fails() {
        let (connector, mut listener) = memory_transport();

        let open = tokio::spawn(async move { connector.open(&url()).await });
        listener.next_open().await.unwrap().reject("refused");

        match open.await.unwrap() {
            Err(Error::ConnectionFailed(msg)) => assert_eq!(msg, "refused"),
            Err(e) => panic!("Expected ConnectionFailed, got {:?}", e),
            Ok(_) => panic!("Expected open to fail"),
        }
    }

    #[tokio::test]
    async fn test_open_without_listener_fails() {
        let (connector, listener) = memory_transport();
        drop(listener);

        assert!(matches!(
            connector.open(&url()).await,
            Err(Error::ConnectionFailed(_))
        ));
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let (connector, mut listener) = memory_transport();

        let open = tokio::spawn(async move { connector.open(&url()).await });
        let peer = listener.accept_next().await.unwrap();
        let (_sink, mut stream) = open.await.unwrap().unwrap();

        peer.close();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_peer_error_surfaces_on_stream() {
        let (connector, mut listener) = memory_transport();

        let open = tokio::spawn(async move { connector.open(&url()).await });
        let peer = listener.accept_next().await.unwrap();
        let (_sink, mut stream) = open.await.unwrap().unwrap();

        peer.send_error(Error::WebSocket("reset by peer".into())).await;
        assert!(matches!(stream.next().await, Some(Err(Error::WebSocket(_)))));
        assert!(stream.next().await.is_none());
    }
}
