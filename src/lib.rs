//! wagate gateway library
//!
//! Bridges one long-lived WhatsApp-style messaging session (pairing via
//! scannable QR code, reconnection on logout) to a small HTTP control
//! interface: readiness probe, pairing code retrieval, and text sending.

pub mod auth;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod jid;
pub mod logging;
pub mod qr;
pub mod server;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;
