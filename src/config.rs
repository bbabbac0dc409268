use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::log::LogLevel;

/// Per-level log routing: `[console, backend]`. The backend flag is carried
/// for wire compatibility with the `config` directive but remote forwarding
/// of log entries is not performed by this engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRouting {
    pub info: [bool; 2],
    pub debug: [bool; 2],
    pub warning: [bool; 2],
    pub error: [bool; 2],
}

impl Default for LogRouting {
    fn default() -> Self {
        Self {
            info: [true, false],
            debug: [true, false],
            warning: [true, false],
            error: [true, false],
        }
    }
}

impl LogRouting {
    pub fn console_enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Info => self.info[0],
            LogLevel::Debug => self.debug[0],
            LogLevel::Warning => self.warning[0],
            LogLevel::Error => self.error[0],
        }
    }
}

/// Engine configuration, merged shallowly by the `config` directive.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Toggle the `pusa-trap` marker class on selected elements.
    pub highlight_trap: bool,
    /// Default endpoint when a send directive carries no explicit url.
    pub callback: String,
    pub log: LogRouting,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            highlight_trap: true,
            callback: "/pusa/default".to_string(),
            log: LogRouting::default(),
        }
    }
}

impl Config {
    /// Shallow merge of a JSON patch: top-level keys replace whole fields,
    /// unknown keys are ignored. Returns false when the patch is not an
    /// object or a known key carries a value of the wrong shape.
    pub fn merge(&mut self, patch: &Value) -> bool {
        let Some(map) = patch.as_object() else {
            return false;
        };
        let mut merged = match serde_json::to_value(&*self) {
            Ok(Value::Object(current)) => current,
            _ => return false,
        };
        for (key, value) in map {
            merged.insert(key.clone(), value.clone());
        }
        match serde_json::from_value::<Config>(Value::Object(merged)) {
            Ok(updated) => {
                *self = updated;
                true
            }
            Err(_) => false,
        }
    }
}
