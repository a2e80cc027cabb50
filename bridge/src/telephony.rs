use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, warn};

use shared_protocol::{OutboundMediaFrame, TelephonyEvent};

type WsStream = WebSocketStream<TcpStream>;

/// The inbound WebSocket connection accepted from the telephony media-stream
/// peer.
pub struct TelephonyLink {
    sender: SplitSink<WsStream, Message>,
    receiver: SplitStream<WsStream>,
}

impl TelephonyLink {
    pub async fn accept(stream: TcpStream) -> Result<Self> {
        let ws_stream = accept_async(stream)
            .await
            .context("failed to accept telephony websocket handshake")?;
        let (sender, receiver) = ws_stream.split();
        Ok(Self { sender, receiver })
    }

    /// Pull the next parsed telephony event. A malformed frame is logged and
    /// skipped in place, matching the rest of the stream; only a genuine
    /// transport failure is surfaced as `Err`.
    pub async fn next_event(&mut self) -> Option<Result<TelephonyEvent>> {
        loop {
            let message = match self.receiver.next().await {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Some(Err(anyhow!("telephony transport error: {err}"))),
                None => return None,
            };
            match message {
                Message::Text(text) => match serde_json::from_str(&text) {
                    Ok(event) => return Some(Ok(event)),
                    Err(err) => {
                        warn!(%err, "failed to parse telephony event; ignoring frame");
                        continue;
                    }
                },
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    debug!(?frame, "telephony peer closed connection");
                    return None;
                }
                Message::Binary(_) | Message::Frame(_) => continue,
            }
        }
    }

    pub async fn send_media(&mut self, frame: OutboundMediaFrame) -> Result<()> {
        let text = serde_json::to_string(&frame).context("failed to serialize media frame")?;
        self.sender
            .send(Message::Text(text.into()))
            .await
            .context("failed to send media frame")
    }

    pub async fn close(&mut self) -> Result<()> {
        self.sender
            .send(Message::Close(None))
            .await
            .context("failed to send close frame to telephony peer")
    }
}
