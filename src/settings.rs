// libuart/src/settings.rs
//
// Serializable device configuration. A `UartConfig` can come from TOML text,
// JSON text, a file picked by extension, or an I/O profile connection map
// with `port` / `baud_rate` style keys.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, UartError};
use crate::uart::options;
use crate::uart::types::{FlowControl, LineSettings, Parity};
use crate::uart::validate;
use crate::uart::Uart;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UartConfig {
    pub path: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_options")]
    pub options: String, // "8N1N" style groups
}

fn default_baud() -> u32 {
    9_600
}

fn default_options() -> String {
    "8N1N".to_string()
}

/// Read an integer that may be stored as a JSON number or a numeric string.
fn profile_int(connection: &HashMap<String, serde_json::Value>, key: &str) -> Option<i64> {
    connection
        .get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
}

impl UartConfig {
    pub fn new(path: impl Into<String>) -> Self {
        UartConfig {
            path: path.into(),
            baud: default_baud(),
            options: default_options(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| UartError::Config(format!("Failed to parse TOML: {}", e)))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| UartError::Config(format!("Failed to parse JSON: {}", e)))
    }

    /// Build from an I/O profile connection map.
    ///
    /// Recognised keys: `port` (required), `baud_rate`, `options`, and the
    /// individual overrides `data_bits`, `parity`, `stop_bits`,
    /// `flow_control`. Overrides are applied on top of `options`.
    pub fn from_profile(connection: &HashMap<String, serde_json::Value>) -> Result<Self> {
        let path = connection
            .get("port")
            .and_then(|v| v.as_str())
            .ok_or_else(|| UartError::Config("Serial port is required".to_string()))?
            .to_string();

        let baud = match profile_int(connection, "baud_rate") {
            Some(b) => u32::try_from(b).map_err(|_| UartError::Config(format!("Invalid baud_rate: {}", b)))?,
            None => default_baud(),
        };

        let mut settings = match connection.get("options").and_then(|v| v.as_str()) {
            Some(opt) => options::parse(opt)?,
            None => LineSettings::default(),
        };

        if let Some(bits) = profile_int(connection, "data_bits") {
            let bits = u8::try_from(bits)
                .map_err(|_| UartError::Config(format!("Invalid data_bits: {}", bits)))?;
            if !validate::is_data_bits_valid(bits) {
                return Err(UartError::InvalidDataBits(bits));
            }
            settings.data_bits = bits;
        }
        if let Some(bits) = profile_int(connection, "stop_bits") {
            let bits = u8::try_from(bits)
                .map_err(|_| UartError::Config(format!("Invalid stop_bits: {}", bits)))?;
            if !validate::is_stop_bits_valid(bits) {
                return Err(UartError::InvalidStopBits(bits));
            }
            settings.stop_bits = bits;
        }
        if let Some(value) = connection.get("parity") {
            settings.parity = serde_json::from_value::<Parity>(value.clone())
                .map_err(|e| UartError::Config(format!("Invalid parity: {}", e)))?;
        }
        if let Some(value) = connection.get("flow_control") {
            settings.flow_control = serde_json::from_value::<FlowControl>(value.clone())
                .map_err(|e| UartError::Config(format!("Invalid flow_control: {}", e)))?;
        }

        Ok(UartConfig {
            path,
            baud,
            options: settings.to_option_string(),
        })
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UartError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(UartError::Config(format!(
                "Unsupported config format: {}",
                path.display()
            ))),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| UartError::Config(format!("Failed to serialize: {}", e)))
    }

    /// Decoded line settings, without touching the device.
    pub fn line_settings(&self) -> Result<LineSettings> {
        Ok(options::parse(&self.options)?)
    }

    /// Open and configure the described device.
    pub fn open(&self) -> Result<Uart> {
        Uart::open(&self.path, self.baud, &self.options)
    }
}

// ============================================================================
// Tests
// ============================================================================
