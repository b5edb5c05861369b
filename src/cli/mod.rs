//! Command-line interface.
//!
//! Every flag has an environment fallback so the gateway can run under a
//! process supervisor without a wrapper script.

use crate::config::{parse_listen_addr, Config, ConfigError};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// WhatsApp session gateway.
#[derive(Parser, Debug)]
#[command(
    name = "wagate",
    version = env!("CARGO_PKG_VERSION"),
    about = "WhatsApp session gateway — pairing, readiness and sending over HTTP"
)]
pub struct Cli {
    /// HTTP server listen address (":8080" binds all interfaces).
    #[arg(long = "http", env = "WAGATE_HTTP", default_value = ":8080")]
    pub http: String,

    /// Shared key required by /qr and /send.
    #[arg(long = "key", env = "WAGATE_KEY", default_value = "", hide_env_values = true)]
    pub key: String,

    /// Device identity store path.
    #[arg(long = "store", env = "WAGATE_STORE", default_value = "device.json")]
    pub store: PathBuf,

    /// Seconds to wait for a send acknowledgement.
    #[arg(long = "send-timeout", env = "WAGATE_SEND_TIMEOUT", default_value_t = 60)]
    pub send_timeout: u64,
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        Ok(Config {
            http_addr: parse_listen_addr(&self.http)?,
            server_key: self.key,
            store_path: self.store,
            send_timeout: Duration::from_secs(self.send_timeout),
        })
    }
}
