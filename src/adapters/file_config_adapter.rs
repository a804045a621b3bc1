//! INI file configuration adapter.
//!
//! Expected sections: `[data]` (`path` to the CSV data directory), `[backtest]`
//! (`initial_investment`), and optionally `[calendar]` (`path` to a trading
//! calendar CSV; absent means weekday calendar).

use crate::domain::error::ArborError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArborError> {
        let mut config = Ini::new();
        config.load(&path).map_err(|e| ArborError::ConfigParse {
            file: path.as_ref().display().to_string(),
            reason: e,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ArborError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|e| ArborError::ConfigParse {
                file: "<inline>".into(),
                reason: e,
            })?;
        Ok(Self { config })
    }

    /// Like [`ConfigPort::get_string`] but required.
    pub fn require_string(&self, section: &str, key: &str) -> Result<String, ArborError> {
        self.get_string(section, key)
            .ok_or_else(|| ArborError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}
