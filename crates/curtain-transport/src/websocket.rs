//! WebSocket signal channels via `tokio-tungstenite`.
//!
//! The channel owns its codec, so envelopes go in and come out typed —
//! callers never see bytes. The authority binds a [`WebSocketListener`];
//! followers dial in with [`WebSocketChannel::connect`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use curtain_protocol::{Codec, Envelope, JsonCodec};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::{ChannelError, ChannelId, SignalChannel, SignalListener};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

type WsStream<S> = tokio_tungstenite::WebSocketStream<S>;
type ServerStream = tokio::net::TcpStream;
type ClientStream =
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>;

fn next_id() -> ChannelId {
    ChannelId::new(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
}

// ---------------------------------------------------------------------------
// Listener (authority side)
// ---------------------------------------------------------------------------

/// Accepts WebSocket signal channels on the authority.
pub struct WebSocketListener {
    listener: TcpListener,
    codec: JsonCodec,
}

impl WebSocketListener {
    /// Binds to the given address.
    pub async fn bind(addr: &str) -> Result<Self, ChannelError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(ChannelError::ConnectFailed)?;
        tracing::info!(addr, "WebSocket listener ready");
        Ok(Self {
            listener,
            codec: JsonCodec,
        })
    }

    /// The local address the listener is bound to (useful when binding
    /// port 0 in tests).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

impl SignalListener for WebSocketListener {
    type Channel = WebSocketChannel<ServerStream>;

    async fn accept(&mut self) -> Result<Self::Channel, ChannelError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(ChannelError::ConnectFailed)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| {
                ChannelError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = next_id();
        tracing::debug!(%id, %addr, "accepted WebSocket channel");

        Ok(WebSocketChannel {
            id,
            ws: Arc::new(Mutex::new(ws)),
            codec: self.codec,
        })
    }
}

// ---------------------------------------------------------------------------
// Channel (both sides)
// ---------------------------------------------------------------------------

/// A WebSocket-backed [`SignalChannel`].
pub struct WebSocketChannel<S> {
    id: ChannelId,
    ws: Arc<Mutex<WsStream<S>>>,
    codec: JsonCodec,
}

impl WebSocketChannel<ClientStream> {
    /// Dials the authority at `url` (e.g. `ws://127.0.0.1:9000`).
    pub async fn connect(url: &str) -> Result<Self, ChannelError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| {
                ChannelError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = next_id();
        tracing::debug!(%id, url, "connected WebSocket channel");

        Ok(Self {
            id,
            ws: Arc::new(Mutex::new(ws)),
            codec: JsonCodec,
        })
    }
}

impl<S> SignalChannel for WebSocketChannel<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + Sync + 'static,
{
    async fn send(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        use futures_util::SinkExt;

        let bytes = self.codec.encode(envelope)?;
        self.ws
            .lock()
            .await
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                ChannelError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Envelope>, ChannelError> {
        use futures_util::StreamExt;

        loop {
            let msg = self.ws.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(self.codec.decode(&data)?));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(self.codec.decode(text.as_bytes())?));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(ChannelError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), ChannelError> {
        use futures_util::SinkExt;

        self.ws.lock().await.close(None).await.map_err(|e| {
            ChannelError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ChannelId {
        self.id
    }
}
