//! Configuration types for the signaling client

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default STUN server used by the browser pages
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Main configuration for a publish or subscribe attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket signaling server URL (ws:// or wss://)
    pub signaling_url: String,

    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// How local candidates reach the backend (default: Incremental)
    pub gathering_mode: GatheringMode,

    /// Delay before the single re-attempt of a send issued while the
    /// channel was still closed (default: 2000ms)
    pub send_retry_delay_ms: u64,

    /// Interval between `get_channels` requests while the directory is
    /// empty (default: 1000ms)
    pub directory_poll_interval_ms: u64,

    /// Wait for `session_received` before allowing another channel pick
    /// (default: false, only some backends send it)
    pub require_session_ack: bool,
}

/// Candidate gathering strategy
///
/// The backend has shipped with both behaviours, so neither is treated as
/// the canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GatheringMode {
    /// Send the description right away and trickle each candidate as an
    /// `ice_candidate` message
    #[default]
    Incremental,
    /// Wait for gathering to finish and send one description with every
    /// candidate embedded
    Batched,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://localhost:8080/ws".to_string(),
            stun_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            gathering_mode: GatheringMode::Incremental,
            send_retry_delay_ms: 2000,
            directory_poll_interval_ms: 1000,
            require_session_ack: false,
        }
    }
}

impl ClientConfig {
    /// Configuration preset that trickles candidates
    ///
    /// # Example
    ///
    /// ```
    /// use babelcast_webrtc::config::{ClientConfig, GatheringMode};
    ///
    /// let config = ClientConfig::trickle("ws://localhost:8080/ws");
    /// assert_eq!(config.gathering_mode, GatheringMode::Incremental);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn trickle(signaling_url: &str) -> Self {
        Self {
            signaling_url: signaling_url.to_string(),
            gathering_mode: GatheringMode::Incremental,
            ..Default::default()
        }
    }

    /// Configuration preset that waits for all candidates before sending
    pub fn batched(signaling_url: &str) -> Self {
        Self {
            signaling_url: signaling_url.to_string(),
            gathering_mode: GatheringMode::Batched,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, filling unset fields with defaults
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::InvalidConfig(format!("Failed to parse configuration: {}", e))
        })
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `signaling_url` is not a WebSocket URL
    /// - `stun_servers` is empty
    /// - `send_retry_delay_ms` or `directory_poll_interval_ms` is zero
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.signaling_url.starts_with("ws://") && !self.signaling_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with ws:// or wss://, got {}",
                self.signaling_url
            )));
        }

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        if self.send_retry_delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "send_retry_delay_ms must be greater than zero".to_string(),
            ));
        }

        if self.directory_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "directory_poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Send retry delay as a Duration
    pub fn send_retry_delay(&self) -> Duration {
        Duration::from_millis(self.send_retry_delay_ms)
    }

    /// Directory poll interval as a Duration
    pub fn directory_poll_interval(&self) -> Duration {
        Duration::from_millis(self.directory_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.send_retry_delay(), Duration::from_secs(2));
        assert_eq!(config.directory_poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_http_url() {
        let config = ClientConfig::trickle("http://localhost:8080");
        assert!(config.validate().unwrap_err().to_string().contains("ws://"));
    }

    #[test]
    fn test_rejects_empty_stun_list() {
        let config = ClientConfig {
            stun_servers: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let config = ClientConfig {
            directory_poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            send_retry_delay_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            ClientConfig::from_json(r#"{"signaling_url": "wss://cast.example/ws", "gathering_mode": "batched"}"#)
                .unwrap();
        assert_eq!(config.signaling_url, "wss://cast.example/ws");
        assert_eq!(config.gathering_mode, GatheringMode::Batched);
        assert_eq!(config.send_retry_delay_ms, 2000);
        assert!(!config.require_session_ack);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = ClientConfig::from_json("not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }
}
