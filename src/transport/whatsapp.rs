//! WhatsApp transport.
//!
//! Integration point for the multi-device WhatsApp protocol. The gateway
//! core is complete against [`SessionTransport`]; this adapter is where a
//! protocol client is mounted and its callbacks mapped onto
//! [`SessionEvent`]s.

use super::{SessionEvent, SessionTransport, TransportError, TransportResult};
use crate::jid::Jid;
use crate::store::{DeviceIdentity, DeviceStore};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Buffered protocol events between the client callback and the controller.
const EVENT_BUFFER: usize = 16;

/// WhatsApp session transport.
pub struct WhatsAppTransport {
    devices: DeviceStore,
    events: mpsc::Sender<SessionEvent>,
}

impl WhatsAppTransport {
    /// Create the transport and the event stream consumed by the controller.
    pub fn new(devices: DeviceStore) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (
            Self {
                devices,
                events: tx,
            },
            rx,
        )
    }

    /// Sender half of the event stream, for the protocol client's callbacks.
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events.clone()
    }
}

// TODO: mount the whatsapp-rust client here (connect/disconnect/send and the
// event-callback-to-SessionEvent mapping).
#[async_trait]
impl SessionTransport for WhatsAppTransport {
    async fn connect(&self) -> TransportResult<()> {
        tracing::info!(store = %self.devices.path().display(), "starting WhatsApp connection");
        Ok(())
    }

    async fn disconnect(&self) {
        tracing::info!("stopping WhatsApp connection");
    }

    async fn send_text(&self, to: &Jid, _text: &str) -> TransportResult<String> {
        tracing::debug!(to = %to, "send requested without a mounted protocol client");
        Err(TransportError::NotConnected)
    }

    fn device_identity(&self) -> Option<DeviceIdentity> {
        self.devices.load().ok().flatten()
    }
}
