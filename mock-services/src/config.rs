//! Mock services configuration.
//!
//! Only the HTTP listen address is configurable, through `MOCK_LISTEN_ADDR`.

use std::net::SocketAddr;

pub const ENV_LISTEN_ADDR: &str = "MOCK_LISTEN_ADDR";

/// Configuration for the mock services HTTP server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Base URL written into metadata service endpoints.
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let listen_addr = SocketAddr::from(([0, 0, 0, 0], 5000));
        Self {
            listen_addr,
            public_url: "http://localhost:5000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var(ENV_LISTEN_ADDR) {
            cfg.listen_addr = raw
                .parse()
                .map_err(|e| format!("{ENV_LISTEN_ADDR}={raw:?} is not a socket address: {e}"))?;
            cfg.public_url = format!("http://localhost:{}", cfg.listen_addr.port());
        }
        Ok(cfg)
    }
}
