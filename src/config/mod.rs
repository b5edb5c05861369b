//! Runtime configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid HTTP listen address {addr:?}: {source}")]
    InvalidListenAddr {
        addr: String,
        source: std::net::AddrParseError,
    },
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub http_addr: SocketAddr,
    /// Shared key guarding `/qr` and `/send`. Never logged.
    pub server_key: String,
    /// Device identity store path.
    pub store_path: PathBuf,
    /// Upper bound on a single send awaiting acknowledgement.
    pub send_timeout: Duration,
}

/// Parse a listen address, accepting the bare `:port` shorthand for
/// all-interfaces binds (`:8080` -> `0.0.0.0:8080`).
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let normalized = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    normalized
        .parse()
        .map_err(|source| ConfigError::InvalidListenAddr {
            addr: addr.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_port_shorthand() {
        assert_eq!(
            parse_listen_addr(":8080").unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_full_address() {
        assert_eq!(
            parse_listen_addr("127.0.0.1:9000").unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            parse_listen_addr("nonsense"),
            Err(ConfigError::InvalidListenAddr { .. })
        ));
    }
}
