//! Configuration - builder for library callers, `BEEZAP_*` environment for the CLI.

use std::path::PathBuf;
use std::time::Duration;

use crate::service::{Network, ServiceConfig};

pub const DEFAULT_RELAYS: [&str; 2] = ["wss://relay.damus.io", "wss://nos.lol"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{var}: invalid value {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct BeezapConfig {
    pub app: String,
    pub root: PathBuf,
    pub network: Network,
    /// Relays written into zap requests.
    pub relays: Vec<String>,
    pub nwc_timeout: Duration,
    pub relay_connect_timeout: Duration,
    pub lnurl_timeout: Duration,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for BeezapConfig {
    fn default() -> Self {
        let service = ServiceConfig::default();
        Self {
            app: "beezap".into(),
            root: crate::storage::data_root(),
            network: Network::default(),
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            nwc_timeout: crate::nwc::DEFAULT_TIMEOUT,
            relay_connect_timeout: Duration::from_secs(10),
            lnurl_timeout: Duration::from_secs(15),
            reconnect_base_delay: service.reconnect_base_delay,
            max_reconnect_attempts: service.max_reconnect_attempts,
            poll_interval: service.poll_interval,
        }
    }
}

impl BeezapConfig {
    pub fn new(app: impl Into<String>) -> Self { Self { app: app.into(), ..Default::default() } }
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self { self.root = root.into(); self }
    pub fn with_network(mut self, network: Network) -> Self { self.network = network; self }
    pub fn with_relays(mut self, relays: Vec<String>) -> Self { self.relays = relays; self }
    pub fn with_nwc_timeout(mut self, timeout: Duration) -> Self { self.nwc_timeout = timeout; self }
    pub fn with_reconnect(mut self, base: Duration, max_attempts: u32) -> Self {
        self.reconnect_base_delay = base;
        self.max_reconnect_attempts = max_attempts;
        self
    }
    pub fn with_poll_interval(mut self, interval: Duration) -> Self { self.poll_interval = interval; self }

    /// Defaults overridden by `BEEZAP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(app) = get("BEEZAP_APP").filter(|v| !v.trim().is_empty()) {
            config.app = app.trim().to_string();
        }
        if let Some(root) = get("BEEZAP_ROOT").filter(|v| !v.trim().is_empty()) {
            config.root = PathBuf::from(root);
        }
        if let Some(value) = get("BEEZAP_NETWORK") {
            config.network = Network::parse(&value).ok_or(ConfigError { var: "BEEZAP_NETWORK", value })?;
        }
        if let Some(value) = get("BEEZAP_RELAYS") {
            let relays: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect();
            if relays.is_empty() || relays.iter().any(|r| !r.starts_with("ws://") && !r.starts_with("wss://")) {
                return Err(ConfigError { var: "BEEZAP_RELAYS", value });
            }
            config.relays = relays;
        }
        if let Some(secs) = parse_u64(&get, "BEEZAP_NWC_TIMEOUT_SECS")? {
            config.nwc_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_u64(&get, "BEEZAP_RECONNECT_BASE_MS")? {
            config.reconnect_base_delay = Duration::from_millis(ms);
        }
        if let Some(max) = parse_u64(&get, "BEEZAP_RECONNECT_MAX")? {
            config.max_reconnect_attempts = u32::try_from(max)
                .map_err(|_| ConfigError { var: "BEEZAP_RECONNECT_MAX", value: max.to_string() })?;
        }
        if let Some(ms) = parse_u64(&get, "BEEZAP_POLL_INTERVAL_MS")? {
            if ms == 0 {
                return Err(ConfigError { var: "BEEZAP_POLL_INTERVAL_MS", value: "0".into() });
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        Ok(config)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            reconnect_base_delay: self.reconnect_base_delay,
            max_reconnect_attempts: self.max_reconnect_attempts,
            poll_interval: self.poll_interval,
        }
    }

    pub fn app_dir(&self) -> PathBuf { self.root.join(&self.app) }

    pub fn storage_path(&self) -> PathBuf { self.app_dir().join("data").join("storage.json") }
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<u64>, ConfigError> {
    match get(var) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = BeezapConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.app, "beezap");
        assert_eq!(config.relays, vec!["wss://relay.damus.io", "wss://nos.lol"]);
        assert_eq!(config.nwc_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn env_overrides() {
        let config = BeezapConfig::from_vars(vars(&[
            ("BEEZAP_ROOT", "/tmp/bz"),
            ("BEEZAP_NETWORK", "signet"),
            ("BEEZAP_RELAYS", "wss://a.example, wss://b.example"),
            ("BEEZAP_NWC_TIMEOUT_SECS", "5"),
            ("BEEZAP_RECONNECT_BASE_MS", "250"),
            ("BEEZAP_RECONNECT_MAX", "3"),
        ]))
        .unwrap();
        assert_eq!(config.network, Network::Signet);
        assert_eq!(config.relays, vec!["wss://a.example", "wss://b.example"]);
        assert_eq!(config.storage_path(), PathBuf::from("/tmp/bz/beezap/data/storage.json"));
        let service = config.service_config();
        assert_eq!(service.reconnect_base_delay, Duration::from_millis(250));
        assert_eq!(service.max_reconnect_attempts, 3);
        assert_eq!(config.nwc_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = BeezapConfig::from_vars(vars(&[("BEEZAP_NWC_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert_eq!(err.var, "BEEZAP_NWC_TIMEOUT_SECS");
        assert!(BeezapConfig::from_vars(vars(&[("BEEZAP_RELAYS", "https://not-a-relay")])).is_err());
        assert!(BeezapConfig::from_vars(vars(&[("BEEZAP_NETWORK", "liquid")])).is_err());
        assert!(BeezapConfig::from_vars(vars(&[("BEEZAP_POLL_INTERVAL_MS", "0")])).is_err());
    }

    #[test]
    fn builder() {
        let config = BeezapConfig::new("demo")
            .with_root("/data")
            .with_reconnect(Duration::from_millis(10), 2)
            .with_poll_interval(Duration::from_millis(50));
        assert_eq!(config.app_dir(), PathBuf::from("/data/demo"));
        assert_eq!(config.service_config().max_reconnect_attempts, 2);
    }
}
