//! In-process channel pairs.
//!
//! [`pair`] returns two connected [`MemoryChannel`]s — what the
//! WebSocket pair looks like with the network removed. Used by the test
//! suites and by single-process demos that run authority and followers
//! in one binary.

use std::sync::atomic::{AtomicU64, Ordering};

use curtain_protocol::Envelope;
use tokio::sync::{Mutex, mpsc};

use crate::{ChannelError, ChannelId, SignalChannel, SignalListener};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// One end of an in-process channel pair.
pub struct MemoryChannel {
    id: ChannelId,
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

/// Creates a connected channel pair. Envelopes sent on one end arrive
/// on the other, in order, until either end is dropped or closed.
pub fn pair() -> (MemoryChannel, MemoryChannel) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    let a = MemoryChannel {
        id: ChannelId::new(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed)),
        tx: a_tx,
        rx: Mutex::new(a_rx),
    };
    let b = MemoryChannel {
        id: ChannelId::new(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed)),
        tx: b_tx,
        rx: Mutex::new(b_rx),
    };
    (a, b)
}

impl SignalChannel for MemoryChannel {
    async fn send(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        self.tx
            .send(envelope.clone())
            .map_err(|_| ChannelError::Closed("peer dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Envelope>, ChannelError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.rx.lock().await.close();
        Ok(())
    }

    fn id(&self) -> ChannelId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// Listener / connector
// ---------------------------------------------------------------------------

/// In-process counterpart of a bound socket: hands the listener one end
/// of a fresh [`pair`] per [`MemoryConnector::connect`] call.
pub struct MemoryListener {
    incoming: Mutex<mpsc::UnboundedReceiver<MemoryChannel>>,
}

/// Dials a [`MemoryListener`]. Cheap to clone.
#[derive(Clone)]
pub struct MemoryConnector {
    tx: mpsc::UnboundedSender<MemoryChannel>,
}

/// Creates a listener and the connector that dials it.
pub fn listener() -> (MemoryListener, MemoryConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryListener {
            incoming: Mutex::new(rx),
        },
        MemoryConnector { tx },
    )
}

impl MemoryConnector {
    /// Opens a new channel to the listener.
    pub fn connect(&self) -> Result<MemoryChannel, ChannelError> {
        let (ours, theirs) = pair();
        self.tx
            .send(theirs)
            .map_err(|_| ChannelError::Closed("listener dropped".into()))?;
        Ok(ours)
    }
}

impl SignalListener for MemoryListener {
    type Channel = MemoryChannel;

    async fn accept(&mut self) -> Result<Self::Channel, ChannelError> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ChannelError::Closed("all connectors dropped".into()))
    }
}
