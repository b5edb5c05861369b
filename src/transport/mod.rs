//! Protocol transport seam.
//!
//! The messaging protocol itself (encryption, multi-device sync, wire
//! framing) lives behind [`SessionTransport`]. The core sees an ordered
//! stream of [`SessionEvent`]s on an mpsc channel plus a send primitive.

pub mod whatsapp;

use crate::jid::Jid;
use crate::store::DeviceIdentity;
use async_trait::async_trait;
use std::sync::Arc;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by the protocol layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Protocol events, delivered one at a time and in order.
///
/// A closed set: new event kinds from the protocol layer must be mapped onto
/// one of these variants (or `Other`) at the transport boundary, so the
/// controller's `match` stays exhaustive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A pairing code was issued and awaits a scan.
    PairingCode(String),
    /// The device was scanned and the session is paired.
    PairSuccess,
    /// The server invalidated the session.
    LoggedOut,
    /// Unrecoverable protocol fault; the session cannot continue.
    StreamFault(String),
    /// Anything else, named for trace logging and otherwise ignored.
    Other(String),
}

/// Handle to one protocol session.
///
/// The transport owns the event `Sender` it was constructed with, so a
/// `connect` after logout re-subscribes implicitly: events keep flowing into
/// the same channel. At most one session exists per process.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Establish (or re-establish) the connection.
    async fn connect(&self) -> TransportResult<()>;

    /// Tear down the connection. Infallible by contract; transports log
    /// their own cleanup failures.
    async fn disconnect(&self);

    /// Send a text message, resolving with the message id once the protocol
    /// layer acknowledges it.
    async fn send_text(&self, to: &Jid, text: &str) -> TransportResult<String>;

    /// Identity of the paired device, if one exists yet.
    fn device_identity(&self) -> Option<DeviceIdentity>;
}

/// Type-erased transport shared between the controller and the gateway.
pub type DynTransport = Arc<dyn SessionTransport>;
