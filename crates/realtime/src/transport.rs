//! Transport seam between the connection kernel and the network.
//!
//! The kernel only needs three things from a live connection: write a text
//! frame, wait for the next text frame, close. [`Connector`] produces such
//! connections; [`WsConnector`] does it over WebSocket with `tokio-tungstenite`.
//!
//! ```text
//! EventClient (handle)
//!     ↓ commands
//! ConnectionKernel (single task, owns everything below)
//!     ↓
//! Connector::connect  ->  Box<dyn Transport>
//!     ↓
//! tokio-tungstenite WebSocketStream
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use super::error::{RealtimeError, Result};

/// One open, bidirectional text-frame connection.
///
/// `next_frame` must be cancel safe: the kernel polls it inside `select!`.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next inbound text frame.
    ///
    /// - `Some(Ok(text))`: a frame arrived
    /// - `Some(Err(_))`: the connection failed
    /// - `None`: the peer closed the connection
    async fn next_frame(&mut self) -> Option<Result<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens new transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// WebSocket connector used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        debug!(status = %response.status(), "WebSocket handshake completed");
        Ok(Box::new(WsTransport { stream }))
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => warn!("Dropping non UTF-8 binary frame ({} bytes)", data.len()),
                },
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(f) => debug!(
                            code = u16::from(f.code),
                            reason = f.reason.as_str(),
                            "Close frame received"
                        ),
                        None => debug!("Close frame received"),
                    }
                    return None;
                }
                // tungstenite answers pings on the next read/write.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                    trace!("Control frame");
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(RealtimeError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ws_connector_reports_refused_connection() {
        // Port 9 (discard) is closed on test machines.
        let result = WsConnector.connect("ws://127.0.0.1:9/ws").await;
        assert!(matches!(result, Err(RealtimeError::WebSocket(_))));
    }

    #[tokio::test]
    async fn test_ws_connector_rejects_bad_url() {
        let result = WsConnector.connect("not a url").await;
        assert!(result.is_err());
    }
}
