//! Session addresses.
//!
//! A JID names a chat endpoint as `user[:device]@server`, e.g.
//! `491700000001@s.whatsapp.net` or `491700000001:12@s.whatsapp.net`.
//! Parse errors are returned verbatim to HTTP callers, so the messages are
//! written for operators.

use std::fmt;
use std::str::FromStr;

/// Errors produced while parsing a session address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidError {
    #[error("invalid JID: missing '@' separator")]
    MissingSeparator,

    #[error("invalid JID: empty user part")]
    EmptyUser,

    #[error("invalid JID: empty server part")]
    EmptyServer,

    #[error("invalid JID: bad device id {0:?}")]
    BadDevice(String),
}

/// A parsed session address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub device: Option<u16>,
    pub server: String,
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Servers never contain '@', so split at the last occurrence.
        let (local, server) = s.rsplit_once('@').ok_or(JidError::MissingSeparator)?;
        if server.is_empty() {
            return Err(JidError::EmptyServer);
        }
        let (user, device) = match local.split_once(':') {
            Some((user, device)) => {
                let device = device
                    .parse::<u16>()
                    .map_err(|_| JidError::BadDevice(device.to_string()))?;
                (user, Some(device))
            }
            None => (local, None),
        };
        if user.is_empty() {
            return Err(JidError::EmptyUser);
        }
        Ok(Jid {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device {
            Some(device) => write!(f, "{}:{}@{}", self.user, device, self.server),
            None => write!(f, "{}@{}", self.user, self.server),
        }
    }
}
