//! Broker configuration

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

/// Broker configuration, layered as defaults -> TOML file -> CLI flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Reliable (TCP) bind address for the handshake dispatcher
    #[serde(default = "default_tcp_addr")]
    pub tcp_addr: String,
    /// Unreliable (UDP) bind address for the datagram relay
    #[serde(default = "default_udp_addr")]
    pub udp_addr: String,
    /// Reaper sweep period, in seconds
    #[serde(default = "default_reaper_period_secs")]
    pub reaper_period_secs: u64,
    /// Liveness age, in seconds, after which a token is considered idle
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// Per-connection budget for completing the handshake, in seconds
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Maximum accepted reliable-frame payload size, in bytes
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u64,
}

fn default_tcp_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_udp_addr() -> String {
    "127.0.0.1:8001".to_string()
}

fn default_reaper_period_secs() -> u64 {
    20
}

fn default_inactivity_timeout_secs() -> u64 {
    300
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

fn default_max_payload_size() -> u64 {
    1 << 20
}

impl BrokerConfig {
    /// Minimum inactivity timeout, in seconds (prevents accidental zero = instant eviction)
    const MIN_INACTIVITY_TIMEOUT: u64 = 5;

    /// Validate and clamp configuration values, logging a warning for each change
    pub fn validate(&mut self) {
        if self.inactivity_timeout_secs < Self::MIN_INACTIVITY_TIMEOUT {
            tracing::warn!(
                configured = self.inactivity_timeout_secs,
                minimum = Self::MIN_INACTIVITY_TIMEOUT,
                "inactivity_timeout_secs too low, clamping"
            );
            self.inactivity_timeout_secs = Self::MIN_INACTIVITY_TIMEOUT;
        }
        if self.reaper_period_secs == 0 {
            tracing::warn!("reaper_period_secs was 0, defaulting to 1");
            self.reaper_period_secs = 1;
        }
        if self.tcp_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::warn!(addr = %self.tcp_addr, "invalid tcp_addr, falling back to default");
            self.tcp_addr = default_tcp_addr();
        }
        if self.udp_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::warn!(addr = %self.udp_addr, "invalid udp_addr, falling back to default");
            self.udp_addr = default_udp_addr();
        }
    }

    /// Load a TOML configuration file and layer it over the defaults
    pub fn from_file(path: &str) -> Result<Self, BrokerError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|e| BrokerError::Config(e.to_string()))?;
        config.validate();
        Ok(config)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            tcp_addr: default_tcp_addr(),
            udp_addr: default_udp_addr(),
            reaper_period_secs: default_reaper_period_secs(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            max_payload_size: default_max_payload_size(),
        }
    }
}
