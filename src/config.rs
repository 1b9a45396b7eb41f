//! Runtime configuration read from the environment.
//!
//! A `.env` file in the working directory is honoured once per process.

use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::warn;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

pub const DEFAULT_ASLAN_ADDRESS: &str = "http://aslan:25000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

/// How the storage URI carried on a pipeline task is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriEncoding {
    Plain,
    Base64,
}

impl UriEncoding {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Some(UriEncoding::Plain),
            "base64" => Some(UriEncoding::Base64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the control-plane service answering callback polls
    pub aslan_address: String,
    /// Cadence of the trigger wait loop
    pub poll_interval: Duration,
    pub uri_encoding: UriEncoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aslan_address: DEFAULT_ASLAN_ADDRESS.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            uri_encoding: UriEncoding::Base64,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Config::default();

        if let Some(addr) = lookup("ASLAN_ADDRESS").filter(|v| !v.trim().is_empty()) {
            cfg.aslan_address = addr.trim().to_string();
        }

        if let Some(raw) = lookup("WARPDRIVE_POLL_INTERVAL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => cfg.poll_interval = Duration::from_secs(secs),
                _ => warn!("ignoring invalid WARPDRIVE_POLL_INTERVAL_SECS={:?}", raw),
            }
        }

        if let Some(raw) = lookup("WARPDRIVE_STORAGE_URI_ENCODING") {
            match UriEncoding::parse(&raw) {
                Some(enc) => cfg.uri_encoding = enc,
                None => warn!("ignoring unknown WARPDRIVE_STORAGE_URI_ENCODING={:?}", raw),
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg.aslan_address, DEFAULT_ASLAN_ADDRESS);
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.uri_encoding, UriEncoding::Base64);
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("ASLAN_ADDRESS", "http://127.0.0.1:8080"),
            ("WARPDRIVE_POLL_INTERVAL_SECS", "10"),
            ("WARPDRIVE_STORAGE_URI_ENCODING", "PLAIN"),
        ]));
        assert_eq!(cfg.aslan_address, "http://127.0.0.1:8080");
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.uri_encoding, UriEncoding::Plain);
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = Config::from_lookup(lookup(&[
            ("WARPDRIVE_POLL_INTERVAL_SECS", "0"),
            ("WARPDRIVE_STORAGE_URI_ENCODING", "rot13"),
        ]));
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.uri_encoding, UriEncoding::Base64);
    }
}
