//! WebSocket transport on `tokio-tungstenite`
//!
//! Outbound frames are sent as binary messages. Inbound binary and text
//! messages are both accepted as frames. Ping/pong is answered by
//! tungstenite itself, and a close message ends the inbound stream.

use super::{Connector, FrameSink, FrameStream};
use async_trait::async_trait;
use futures::future;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;
use wingrpc_core::{Error, Result};

/// Opens WebSocket connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::ConnectionFailed(format!("{}: {}", url, e)))?;

        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| Error::WebSocket(e.to_string()))
            .with(|frame: Vec<u8>| future::ready(Ok::<_, Error>(Message::Binary(frame))));

        let stream = read
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Binary(data)) => Some(Ok(data)),
                    Ok(Message::Text(text)) => Some(Ok(text.into_bytes())),
                    Ok(_) => None,
                    Err(e) => Some(Err(Error::WebSocket(e.to_string()))),
                })
            });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
