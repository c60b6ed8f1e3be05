use crate::protocol::EVENT_QUEUE_CAP;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_CLIENT_NAME: &str = "CARLA_CLIENT_NAME";
pub const ENV_DRIVER: &str = "CARLA_DRIVER";
pub const ENV_LIBRARY: &str = "CARLA_LIBRARY";
pub const ENV_EVENT_QUEUE_CAP: &str = "CARLA_EVENT_QUEUE_CAP";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidCapacity { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Name the engine registers with the audio driver (the JACK client name).
    pub client_name: String,
    pub driver_name: String,
    /// `libcarla_standalone2` location; the platform default is used when unset.
    pub library_path: Option<PathBuf>,
    pub event_queue_cap: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            client_name: "carla_host".to_string(),
            driver_name: "JACK".to_string(),
            library_path: None,
            event_queue_cap: EVENT_QUEUE_CAP,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overridden by whatever `lookup` returns.
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(name) = get(ENV_CLIENT_NAME) {
            config.client_name = name;
        }
        if let Some(driver) = get(ENV_DRIVER) {
            config.driver_name = driver;
        }
        if let Some(path) = get(ENV_LIBRARY) {
            config.library_path = Some(PathBuf::from(path));
        }
        if let Some(cap) = get(ENV_EVENT_QUEUE_CAP) {
            config.event_queue_cap = match cap.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidCapacity {
                        var: ENV_EVENT_QUEUE_CAP,
                        value: cap,
                    })
                }
            };
        }
        Ok(config)
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
    fn empty_environment_gives_defaults() {
        let config = HostConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.event_queue_cap, 256);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = HostConfig::from_lookup(lookup(&[
            (ENV_CLIENT_NAME, "studio"),
            (ENV_DRIVER, " ALSA "),
            (ENV_LIBRARY, "/opt/carla/libcarla_standalone2.so"),
            (ENV_EVENT_QUEUE_CAP, "1024"),
        ]))
        .unwrap();
        assert_eq!(config.client_name, "studio");
        assert_eq!(config.driver_name, "ALSA");
        assert_eq!(
            config.library_path,
            Some(PathBuf::from("/opt/carla/libcarla_standalone2.so"))
        );
        assert_eq!(config.event_queue_cap, 1024);
    }

    #[test]
    fn bad_capacity_is_rejected() {
        for bad in ["0", "-3", "lots"] {
            let err = HostConfig::from_lookup(lookup(&[(ENV_EVENT_QUEUE_CAP, bad)])).unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidCapacity {
                    var: ENV_EVENT_QUEUE_CAP,
                    value: bad.to_string(),
                }
            );
        }
    }

    #[test]
    fn blank_values_are_unset() {
        let config = HostConfig::from_lookup(lookup(&[(ENV_DRIVER, "  ")])).unwrap();
        assert_eq!(config.driver_name, "JACK");
    }
}
