//! Common test utilities for wingrpc-client integration tests
//!
//! `MockWsServer` is a real WebSocket server on a loopback port. Each
//! accepted socket is handed to the test as a `MockConnection`, which reads
//! the client's requests and writes whatever frames the test scripts.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Mock WebSocket server for client testing
pub struct MockWsServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    connections: mpsc::UnboundedReceiver<MockConnection>,
}

/// One accepted socket
pub struct MockConnection {
    requests: mpsc::UnboundedReceiver<Value>,
    outgoing: mpsc::UnboundedSender<Message>,
}

impl MockWsServer {
    /// Start listening on an ephemeral loopback port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();

        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let (mut write, mut read) = ws.split();
                let (req_tx, req_rx) = mpsc::unbounded_channel();
                let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

                tokio::spawn(async move {
                    while let Some(msg) = out_rx.recv().await {
                        let closing = matches!(msg, Message::Close(_));
                        if write.send(msg).await.is_err() || closing {
                            break;
                        }
                    }
                });

                tokio::spawn(async move {
                    while let Some(Ok(msg)) = read.next().await {
                        let bytes = match msg {
                            Message::Binary(data) => data,
                            Message::Text(text) => text.into_bytes(),
                            Message::Close(_) => break,
                            _ => continue,
                        };
                        if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
                            let _ = req_tx.send(value);
                        }
                    }
                });

                let _ = conn_tx.send(MockConnection {
                    requests: req_rx,
                    outgoing: out_tx,
                });
            }
        });

        Self {
            addr,
            accepted,
            connections: conn_rx,
        }
    }

    /// Start a server that answers every request with `handler(method, params)`
    ///
    /// `Some(result)` sends a success reply, `None` leaves the call unanswered.
    pub async fn responding<F>(handler: F) -> Self
    where
        F: Fn(&str, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        let mut server = Self::start().await;
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let mut upstream = std::mem::replace(&mut server.connections, conn_rx);
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Some(mut conn) = upstream.recv().await {
                let handler = handler.clone();
                let (req_tx, req_rx) = mpsc::unbounded_channel();
                let outgoing = conn.outgoing.clone();
                tokio::spawn(async move {
                    while let Some(request) = conn.requests.recv().await {
                        let method = request["method"].as_str().unwrap_or_default();
                        if let Some(result) = handler(method, request.get("params")) {
                            let reply = json!({"id": request["id"], "result": result});
                            let _ = conn.outgoing.send(Message::Text(reply.to_string()));
                        }
                        let _ = req_tx.send(request);
                    }
                });
                let _ = conn_tx.send(MockConnection {
                    requests: req_rx,
                    outgoing,
                });
            }
        });

        server
    }

    /// `ws://` URL of the server
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Number of WebSocket handshakes completed
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted socket
    pub async fn next_connection(&mut self) -> MockConnection {
        tokio::time::timeout(Duration::from_secs(5), self.connections.recv())
            .await
            .expect("no connection within 5s")
            .expect("server task ended")
    }
}

impl MockConnection {
    /// Wait for the next request the client sent
    pub async fn next_request(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("no request within 5s")
            .expect("connection closed")
    }

    /// Send a success reply
    pub fn reply(&self, id: &Value, result: Value) {
        self.send_text(json!({"id": id, "result": result}).to_string());
    }

    /// Send an error reply
    pub fn reply_error(&self, id: &Value, code: i32, message: &str) {
        self.send_text(
            json!({"id": id, "error": {"code": code, "message": message}}).to_string(),
        );
    }

    /// Send an arbitrary text frame
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.outgoing.send(Message::Text(text.into()));
    }

    /// Send an arbitrary binary frame
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) {
        let _ = self.outgoing.send(Message::Binary(data.into()));
    }

    /// Start the closing handshake
    pub fn close(&self) {
        let _ = self.outgoing.send(Message::Close(None));
    }
}

/// Poll `check` until it holds or a second passes
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
