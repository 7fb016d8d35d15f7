//! Node configuration from the environment.

use crate::error::{Error, Result};
use sigrelay_core::RelayConfig;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Listen port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8087;

/// `Server` header value sent with every response.
pub const DEFAULT_SERVER_ID: &str = "PeerConnectionTestServer/0.1g";

/// Configuration for a relay node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// HTTP listen address
    pub listen_addr: SocketAddr,

    /// Fixed server identifier for the `Server` header
    pub server_id: String,

    /// Registry, mailbox and sweeper settings
    pub relay: RelayConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            server_id: DEFAULT_SERVER_ID.to_string(),
            relay: RelayConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    ///
    /// - `PORT` (8087), `SIGRELAY_BIND` (0.0.0.0)
    /// - `SIGRELAY_SERVER_ID`
    /// - `SIGRELAY_MAILBOX_CAPACITY` (100)
    /// - `SIGRELAY_IDLE_TIMEOUT_SECS` (60), `SIGRELAY_SWEEP_INTERVAL_SECS` (30)
    /// - `SIGRELAY_RESPONDER_PREFIX` (renderingserver_)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port: u16 = parse_var(&var, "PORT")?.unwrap_or(DEFAULT_PORT);
        let bind: IpAddr = parse_var(&var, "SIGRELAY_BIND")?.unwrap_or(defaults.listen_addr.ip());

        let server_id = var("SIGRELAY_SERVER_ID")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.server_id);

        let mut relay = defaults.relay;
        if let Some(capacity) = parse_var::<usize, _>(&var, "SIGRELAY_MAILBOX_CAPACITY")? {
            if capacity == 0 {
                return Err(Error::Config(
                    "SIGRELAY_MAILBOX_CAPACITY must be at least 1".into(),
                ));
            }
            relay.mailbox_capacity = capacity;
        }
        if let Some(secs) = parse_var::<u64, _>(&var, "SIGRELAY_IDLE_TIMEOUT_SECS")? {
            relay.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&var, "SIGRELAY_SWEEP_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(Error::Config(
                    "SIGRELAY_SWEEP_INTERVAL_SECS must be at least 1".into(),
                ));
            }
            relay.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(prefix) = var("SIGRELAY_RESPONDER_PREFIX") {
            relay.responder_prefix = prefix;
        }

        Ok(Self {
            listen_addr: SocketAddr::new(bind, port),
            server_id,
            relay,
        })
    }
}

fn parse_var<T, F>(var: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}"))),
    }
}
