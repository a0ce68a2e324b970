use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default gateway control port.
pub const DEFAULT_PORT: u16 = 51200;

/// Connection settings for one gateway.
///
/// Host applications usually deserialize this from their own configuration
/// files; every field has a serde default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interface identifier handed to the unsolicited-packet sink.
    pub id: String,
    /// Gateway hostname or address. Required.
    pub host: String,
    /// Gateway port; 0 falls back to [`DEFAULT_PORT`].
    pub port: u16,
    /// Shared secret. Required; sent as a 32-byte zero-padded field.
    pub password: String,
    /// Per-address TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Optional scheduling priority for the listen thread.
    pub listen_thread_priority: Option<i32>,
    /// Optional scheduling policy for the listen thread.
    pub listen_thread_policy: Option<SchedPolicy>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            id: "klf200".to_string(),
            host: String::new(),
            port: DEFAULT_PORT,
            password: String::new(),
            connect_timeout_secs: 5,
            listen_thread_priority: None,
            listen_thread_policy: None,
        }
    }
}

impl GatewayConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ClientError::Config("hostname is missing"));
        }
        if self.password.is_empty() {
            return Err(ClientError::Config("password is missing"));
        }
        Ok(())
    }

    /// Target port, falling back to the default when unset.
    pub fn port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_PORT
        } else {
            self.port
        }
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Listen-thread scheduling policy hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedPolicy {
    Fifo,
    RoundRobin,
    Other,
}
