use std::path::PathBuf;

use tracing::warn;

use crate::schedule::{default_slot_count, time_slots, TimeSlot};

pub const STORE_ENV: &str = "TIMETABLE_STORE";
pub const SLOT_COUNT_ENV: &str = "TIMETABLE_SLOT_COUNT";
pub const DEFAULT_STORE_PATH: &str = "timetable.json";
pub const DEFAULT_PORT: u16 = 8080;

/// Runtime settings, read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where the schedule document lives
    pub store_path: PathBuf,
    /// Rows of the displayed grid; slots at or beyond this are dropped
    pub display_slot_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            display_slot_count: default_slot_count(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; invalid values fall back to
    /// the defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup(STORE_ENV).filter(|p| !p.trim().is_empty()) {
            config.store_path = PathBuf::from(path.trim());
        }

        if let Some(raw) = lookup(SLOT_COUNT_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(count) if count >= 1 => config.display_slot_count = count,
                _ => warn!(
                    "Ignoring {}={:?}; using {} slots",
                    SLOT_COUNT_ENV, raw, config.display_slot_count
                ),
            }
        }

        config
    }

    /// Labels for every displayed row
    pub fn time_slots(&self) -> Vec<TimeSlot> {
        time_slots(self.display_slot_count)
    }
}

/// Port from the optional `web [port]` argument
pub fn parse_port(arg: Option<&String>) -> u16 {
    arg.and_then(|p| p.parse::<u16>().ok()).unwrap_or(DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.display_slot_count, 13);
        assert_eq!(config.time_slots().len(), 13);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[(STORE_ENV, "/tmp/t.json"), (SLOT_COUNT_ENV, "10")]));
        assert_eq!(config.store_path, PathBuf::from("/tmp/t.json"));
        assert_eq!(config.display_slot_count, 10);
    }

    #[test]
    fn invalid_slot_count_falls_back() {
        for raw in ["0", "-3", "many"] {
            let config = Config::from_lookup(lookup(&[(SLOT_COUNT_ENV, raw)]));
            assert_eq!(config.display_slot_count, 13);
        }
    }

    #[test]
    fn port_argument() {
        assert_eq!(parse_port(Some(&"9000".to_string())), 9000);
        assert_eq!(parse_port(Some(&"x".to_string())), DEFAULT_PORT);
        assert_eq!(parse_port(None), DEFAULT_PORT);
    }
}
