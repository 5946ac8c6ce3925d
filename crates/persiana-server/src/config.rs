use core::fmt;

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct BrokerConfig {
    /// Broker host name or address.
    #[serde(default = "default_broker_address")]
    pub(crate) address: String,
    /// Broker port number.
    #[serde(default = "default_broker_port")]
    pub(crate) port: u16,
    /// The client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub(crate) client_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: default_broker_address(),
            port: default_broker_port(),
            client_id: default_client_id(),
        }
    }
}

/// One entry of the device directory.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct DeviceConfig {
    /// Device identifier.
    pub(crate) id: String,
    /// Device secret key.
    pub(crate) key: String,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Service configuration, read from an optional JSON file.
///
/// Every field has a default, so the service also starts with no file at
/// all. Broker and listen addresses can be overridden through the
/// `PERSIANA_BROKER_ADDRESS`, `PERSIANA_BROKER_PORT`, and `PERSIANA_LISTEN`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Config {
    /// Broker connection parameters.
    #[serde(default)]
    pub(crate) broker: BrokerConfig,
    /// The socket address the HTTP server listens on.
    #[serde(default = "default_listen")]
    pub(crate) listen: SocketAddr,
    /// How long a read-style call waits for telemetry, in milliseconds.
    #[serde(default = "default_wait_timeout_ms")]
    pub(crate) wait_timeout_ms: u64,
    /// The devices callers may control.
    #[serde(default)]
    pub(crate) devices: Vec<DeviceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            listen: default_listen(),
            wait_timeout_ms: default_wait_timeout_ms(),
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the configuration file, or the defaults when `path` is
    /// [`None`], then applies the environment overrides.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    format!("failed to read the configuration at {}: {e}", path.display())
                })?;
                serde_json::from_str(&raw)
                    .map_err(|e| format!("failed to parse the configuration: {e}"))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// The wait deadline applied to every read-style call.
    pub(crate) const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var("PERSIANA_BROKER_ADDRESS") {
            self.broker.address = address;
        }
        if let Ok(port) = std::env::var("PERSIANA_BROKER_PORT")
            && let Ok(port) = port.parse()
        {
            self.broker.port = port;
        }
        if let Ok(listen) = std::env::var("PERSIANA_LISTEN")
            && let Ok(listen) = listen.parse()
        {
            self.listen = listen;
        }
    }
}

fn default_broker_address() -> String {
    "localhost".to_owned()
}

const fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "persiana".to_owned()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

const fn default_wait_timeout_ms() -> u64 {
    5000
}
