//! RelayCast configuration
//!
//! All settings come from environment variables with defaults suitable for a
//! local Redis. The transport collaborator's listen port and static file
//! serving are configured by the collaborator, not here.

use std::env;

/// RelayCast configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis host (RELAY_REDIS_HOST, default: localhost)
    pub redis_host: String,
    /// Redis port (RELAY_REDIS_PORT, default: 6379)
    pub redis_port: u16,
    /// Subscribed downlink channel (RELAY_INBOUND_CHANNEL)
    pub inbound_channel: String,
    /// Uplink channel for lifecycle envelopes (RELAY_UPLINK_CHANNEL)
    pub uplink_channel: String,
    /// Delivery sink channel capacity (RELAY_OUTGOING_BUFFER)
    pub outgoing_buffer: usize,
}

impl Config {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis_host = env::var("RELAY_REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());

        let redis_port = match env::var("RELAY_REDIS_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("RELAY_REDIS_PORT", "expected u16"))?,
            Err(_) => 6379,
        };

        let inbound_channel =
            env::var("RELAY_INBOUND_CHANNEL").unwrap_or_else(|_| "relay:inbound".to_string());

        let uplink_channel =
            env::var("RELAY_UPLINK_CHANNEL").unwrap_or_else(|_| "relay:app".to_string());

        let outgoing_buffer = match env::var("RELAY_OUTGOING_BUFFER") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("RELAY_OUTGOING_BUFFER", "expected usize"))?,
            Err(_) => 1024,
        };

        Ok(Self {
            redis_host,
            redis_port,
            inbound_channel,
            uplink_channel,
            outgoing_buffer,
        })
    }

    /// Redis connection URL
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid environment variable {0}: {1}")]
    InvalidEnv(&'static str, &'static str),
}
