use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::world::rules::Ruleset;

/// Server settings, read from the environment (and `.env`) once at startup.
#[derive(Debug, Clone)]
pub(crate) struct ServerConfig {
    pub(crate) bind: IpAddr,
    pub(crate) port: u16,
    pub(crate) web_port: u16,
    pub(crate) save_path: PathBuf,
    /// Where `antcraft solo` keeps its edits.
    pub(crate) solo_path: PathBuf,
    /// Seed for a fresh world. Ignored when a save is loaded.
    pub(crate) seed: Option<i64>,
    pub(crate) ruleset: Ruleset,
    pub(crate) autosave: Duration,
    pub(crate) cleanup: Duration,
    pub(crate) dig_cooldown: Duration,
    pub(crate) cache_capacity: usize,
    pub(crate) active_radius: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 7878,
            web_port: 8080,
            save_path: PathBuf::from("world.json"),
            solo_path: PathBuf::from("solo.json"),
            seed: None,
            ruleset: Ruleset::server(),
            autosave: Duration::from_secs(300),
            cleanup: Duration::from_secs(30),
            dig_cooldown: Duration::from_millis(1000),
            cache_capacity: 256,
            active_radius: 4,
        }
    }
}

fn parsed<T: FromStr>(source: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match source(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring malformed {key}={raw}");
                default
            }
        },
    }
}

impl ServerConfig {
    pub(crate) fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    pub(crate) fn from_source(source: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let ruleset = match source("ANTCRAFT_RULESET") {
            None => default.ruleset,
            Some(name) => Ruleset::by_name(name.trim()).unwrap_or_else(|| {
                warn!("Unknown ruleset {name}, using {}", default.ruleset.name);
                default.ruleset
            }),
        };
        Self {
            bind: parsed(&source, "ANTCRAFT_BIND", default.bind),
            port: parsed(&source, "ANTCRAFT_PORT", default.port),
            web_port: parsed(&source, "ANTCRAFT_WEB_PORT", default.web_port),
            save_path: source("ANTCRAFT_SAVE_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.save_path),
            solo_path: source("ANTCRAFT_SOLO_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.solo_path),
            seed: source("ANTCRAFT_SEED").and_then(|raw| match raw.trim().parse() {
                Ok(seed) => Some(seed),
                Err(_) => {
                    warn!("Ignoring malformed ANTCRAFT_SEED={raw}");
                    None
                }
            }),
            ruleset,
            autosave: Duration::from_secs(parsed(&source, "ANTCRAFT_AUTOSAVE_SECS", 300u64).max(1)),
            cleanup: Duration::from_secs(parsed(&source, "ANTCRAFT_CLEANUP_SECS", 30u64).max(1)),
            dig_cooldown: Duration::from_millis(parsed(&source, "ANTCRAFT_DIG_COOLDOWN_MS", 1000)),
            cache_capacity: parsed(&source, "ANTCRAFT_CACHE_CAPACITY", default.cache_capacity),
            active_radius: parsed(&source, "ANTCRAFT_ACTIVE_RADIUS", default.active_radius).max(0),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.port, 7878);
        assert_eq!(config.ruleset.name, "server");
        assert_eq!(config.seed, None);
        assert_eq!(config.autosave, Duration::from_secs(300));
        assert_eq!(config.solo_path, PathBuf::from("solo.json"));
    }

    #[test]
    fn values_are_read() {
        let config = config(&[
            ("ANTCRAFT_PORT", "9000"),
            ("ANTCRAFT_SEED", "-42"),
            ("ANTCRAFT_RULESET", "ant"),
            ("ANTCRAFT_SAVE_PATH", "/tmp/w.json"),
            ("ANTCRAFT_SOLO_PATH", "/tmp/s.json"),
            ("ANTCRAFT_DIG_COOLDOWN_MS", "250"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.seed, Some(-42));
        assert_eq!(config.ruleset.name, "ant");
        assert_eq!(config.save_path, PathBuf::from("/tmp/w.json"));
        assert_eq!(config.solo_path, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.dig_cooldown, Duration::from_millis(250));
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = config(&[
            ("ANTCRAFT_PORT", "http"),
            ("ANTCRAFT_SEED", "abc"),
            ("ANTCRAFT_RULESET", "minecraft"),
            ("ANTCRAFT_ACTIVE_RADIUS", "-3"),
        ]);
        assert_eq!(config.port, 7878);
        assert_eq!(config.seed, None);
        assert_eq!(config.ruleset.name, "server");
        assert_eq!(config.active_radius, 0);
    }
}
