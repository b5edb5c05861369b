//! Persistent device identity.
//!
//! Opaque load/save facility for the paired device. The gateway only cares
//! whether an identity exists (startup fast path) and that it is written on
//! pairing and removed on logout; the credential blob inside is owned by the
//! protocol layer.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("device store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("device store corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Identity of a paired device, opaque beyond the owning JID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// JID the device is registered under.
    pub jid: String,
    /// Protocol-layer credential blob, passed through untouched.
    #[serde(default)]
    pub credentials: serde_json::Value,
}

/// JSON-file-backed device identity store.
#[derive(Debug, Clone)]
pub struct DeviceStore {
    path: PathBuf,
}

impl DeviceStore {
    /// Open a store at `path`, creating parent directories.
    ///
    /// Failure here is startup-fatal: a gateway that cannot persist its
    /// identity would lose the pairing on every restart.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted identity. `Ok(None)` means a fresh start; a present
    /// but unreadable file is an error (startup-fatal at boot).
    pub fn load(&self) -> Result<Option<DeviceIdentity>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let identity = serde_json::from_slice(&raw)?;
        Ok(Some(identity))
    }

    /// Persist an identity atomically (write to temp, rename).
    pub fn save(&self, identity: &DeviceIdentity) -> Result<(), StoreError> {
        let raw = serde_json::to_vec_pretty(identity)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Remove the persisted identity. Absence is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
