//! Configuration of revad.
//!
//! Configuration is read from `revad/config.json` in xdg config directories,
//! then debug mask is overwritten by `REVAD_DEBUG` env variable if it is set.
//!
//! REVAD_DEBUG is bitmask
//! 0000 0001 DEBUG_ORDER
//! 0000 0010 DEBUG_EVAL
//! 0000 0100 DEBUG_GRAD
//! 0000 1000 DEBUG_CONFIG

use crate::error::RevadError;
use nanoserde::DeJson;
use std::path::Path;

/// Rendering options of dot graphs
#[derive(DeJson, Debug, Clone, Default, PartialEq, Eq)]
pub struct DotConfig {
    /// Print values of evaluated nodes into labels
    #[nserde(default)]
    pub show_values: bool,
    /// Draw graph top to bottom instead of left to right
    #[nserde(default)]
    pub top_to_bottom: bool,
}

/// Configuration
#[derive(DeJson, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Debug mask
    #[nserde(default)]
    pub debug: u32,
    /// Dot rendering
    #[nserde(default)]
    pub dot: DotConfig,
}

impl Config {
    /// Load configuration from config directories and environment.
    /// Missing or invalid config file results in defaults.
    #[must_use]
    pub fn load() -> Config {
        let env_debug = std::env::var("REVAD_DEBUG").ok().and_then(|x| x.parse::<u32>().ok());
        let debug_config = env_debug.is_some_and(|x| x & 8 != 0);
        let mut config = xdg::BaseDirectories::new()
            .map_err(|e| {
                if debug_config {
                    log::warn!("Failed to find config directories for config.json, {e}");
                }
            })
            .ok()
            .and_then(|bd| bd.find_config_file("revad/config.json"))
            .and_then(|path| {
                Config::from_file(&path)
                    .map_err(|e| {
                        if debug_config {
                            log::warn!("Failed to read {}, {e}", path.display());
                        }
                    })
                    .ok()
            })
            .inspect(|_| {
                if debug_config {
                    log::debug!("Config successfully read and parsed.");
                }
            })
            .unwrap_or_else(|| {
                if debug_config {
                    log::debug!("Failed to get config, using defaults.");
                }
                Config::default()
            });
        if let Some(debug) = env_debug {
            config.debug = debug;
        }
        config
    }

    /// Read configuration from json file
    /// # Errors
    /// Returns [`RevadError::IOError`] if file can not be read and
    /// [`RevadError::ParseError`] if it is not valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, RevadError> {
        let file = std::fs::read_to_string(path)?;
        Config::from_json(&file)
    }

    /// Parse configuration from json string
    /// # Errors
    /// Returns [`RevadError::ParseError`] if json is not valid configuration.
    pub fn from_json(json: &str) -> Result<Config, RevadError> {
        Config::deserialize_json(json).map_err(|e| RevadError::parse_error(format!("config.json, {e}")))
    }

    /// Print topological orderings
    #[must_use]
    pub const fn debug_order(&self) -> bool {
        self.debug & 1 != 0
    }

    /// Print evaluated values
    #[must_use]
    pub const fn debug_eval(&self) -> bool {
        self.debug & 2 != 0
    }

    /// Print accumulated gradients
    #[must_use]
    pub const fn debug_grad(&self) -> bool {
        self.debug & 4 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DotConfig};

    #[test]
    fn parse_partial() {
        let config = Config::from_json(r#"{"debug": 5}"#).unwrap();
        assert_eq!(config.debug, 5);
        assert!(config.debug_order());
        assert!(!config.debug_eval());
        assert!(config.debug_grad());
        assert_eq!(config.dot, DotConfig::default());
    }

    #[test]
    fn parse_dot() {
        let config = Config::from_json(r#"{"dot": {"show_values": true}}"#).unwrap();
        assert_eq!(config.debug, 0);
        assert!(config.dot.show_values);
        assert!(!config.dot.top_to_bottom);
    }

    #[test]
    fn parse_invalid() {
        assert!(Config::from_json(r#"{"debug": "five"}"#).is_err());
        assert!(Config::from_json("[1, 2").is_err());
    }
}
