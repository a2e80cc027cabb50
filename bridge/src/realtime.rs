use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::{SinkExt, StreamExt};
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use shared_protocol::{
    RealtimeClientEvent, RealtimeServerEvent, ResponseCreateBody, SessionConfig,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The outbound WebSocket connection to the realtime speech/LLM peer.
pub struct RealtimeLink {
    sender: SplitSink<WsStream, Message>,
    receiver: SplitStream<WsStream>,
}

impl RealtimeLink {
    pub async fn connect(
        ws_url: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Self> {
        let url = format!("{ws_url}?model={model}");
        let mut request = url.into_client_request().context("invalid realtime ws url")?;
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .context("invalid realtime api key")?,
        );
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = connect_async(request)
            .await
            .context("failed to connect to realtime peer")?;
        let (sender, receiver) = ws_stream.split();
        Ok(Self { sender, receiver })
    }

    pub async fn send_session_config(&mut self, session: SessionConfig) -> Result<()> {
        self.send_json(&RealtimeClientEvent::SessionUpdate { session }).await
    }

    pub async fn send_initial_directive(&mut self, instructions: impl Into<String>) -> Result<()> {
        self.send_json(&RealtimeClientEvent::ResponseCreate {
            response: ResponseCreateBody {
                instructions: instructions.into(),
            },
        })
        .await
    }

    /// Encode a chunk of 16kHz PCM16 audio and forward it as an audio-buffer
    /// append event.
    pub async fn append_audio(&mut self, pcm16_16k_bytes: &[u8]) -> Result<()> {
        let audio = BASE64.encode(pcm16_16k_bytes);
        self.send_json(&RealtimeClientEvent::InputAudioBufferAppend { audio }).await
    }

    async fn send_json(&mut self, event: &RealtimeClientEvent) -> Result<()> {
        let text = serde_json::to_string(event).context("failed to serialize realtime event")?;
        self.sender
            .send(Message::Text(text.into()))
            .await
            .context("failed to send realtime event")
    }

    /// Pull the next parsed server event, skipping control frames. A
    /// malformed event is logged and skipped in place; only a genuine
    /// transport failure is surfaced as `Err`. Returns `None` once the peer
    /// closes the connection.
    pub async fn next_event(&mut self) -> Option<Result<RealtimeServerEvent>> {
        loop {
            let message = match self.receiver.next().await {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Some(Err(anyhow!("realtime transport error: {err}"))),
                None => return None,
            };
            match message {
                Message::Text(text) => match serde_json::from_str(&text) {
                    Ok(event) => return Some(Ok(event)),
                    Err(err) => {
                        warn!(%err, "failed to parse realtime server event; ignoring frame");
                        continue;
                    }
                },
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    debug!(?frame, "realtime peer closed connection");
                    return None;
                }
                Message::Binary(_) | Message::Frame(_) => continue,
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        if let Err(err) = self.sender.send(Message::Close(None)).await {
            warn!(%err, "failed to send close frame to realtime peer");
        }
        Ok(())
    }
}
