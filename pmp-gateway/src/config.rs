//! Gateway configuration
//!
//! Handles:
//! - JSON configuration files (primary format)
//! - Legacy `key = value` text files with dotted keys
//! - Cloud-credentials validation before any hardware is touched
//!
//! The configuration is read once at start-up and never mutated afterwards.

use crate::error::GatewayError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CERTIFICATE_EXT: &str = ".cert.pem";
pub const PRIVATE_KEY_EXT: &str = ".private.key";

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub serial_port: SerialPortConfig,
    pub setup: SetupConfig,
    #[serde(default)]
    pub cloud: Option<CloudConfig>,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub timers: TimerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialPortConfig {
    pub name: String,
    pub baudrate_bits_per_second: u32,
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        Self { name: "/dev/ttyUSB0".to_string(), baudrate_bits_per_second: 230_400 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetupConfig {
    pub use_sensors: bool,
    pub use_cloud: bool,
    pub use_threads_for_polling_sensors: bool,
    #[serde(default = "default_certificates_path")]
    pub device_certificates_path: PathBuf,
    pub devices: Vec<DeviceDescriptor>,
}

fn default_certificates_path() -> PathBuf {
    PathBuf::from("/usr/local/predmnt/devices_pmp_aws")
}

/// One configured sensor: its identity and its masterboard position.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub position: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_cloud_port")]
    pub port: u16,
    #[serde(default)]
    pub root_ca_path: String,
}

fn default_cloud_port() -> u16 {
    8883
}

#[derive(Debug, Clone, Deserialize)]
pub struct DumpConfig {
    #[serde(default)]
    pub env_samples: u32,
    #[serde(default)]
    pub tdm_samples: u32,
    #[serde(default)]
    pub fdm_samples: u32,
    #[serde(default = "default_dump_directory")]
    pub directory: PathBuf,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self { env_samples: 0, tdm_samples: 0, fdm_samples: 0, directory: default_dump_directory() }
    }
}

fn default_dump_directory() -> PathBuf {
    PathBuf::from(".")
}

/// Polling periods per signal class, seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_env_seconds")]
    pub env_seconds: u64,
    #[serde(default = "default_tdm_seconds")]
    pub tdm_seconds: u64,
    #[serde(default = "default_fdm_seconds")]
    pub fdm_seconds: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            env_seconds: default_env_seconds(),
            tdm_seconds: default_tdm_seconds(),
            fdm_seconds: default_fdm_seconds(),
        }
    }
}

fn default_env_seconds() -> u64 {
    30
}
fn default_tdm_seconds() -> u64 {
    30
}
fn default_fdm_seconds() -> u64 {
    5
}

impl GatewayConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::ConfigInvalid(format!(
                "cannot read configuration file {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::parse(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse either JSON or the legacy `key = value` format.
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let value = if text.trim_start().starts_with('{') {
            serde_json::from_str::<serde_json::Value>(text)
                .map_err(|e| GatewayError::ConfigInvalid(format!("invalid JSON: {e}")))?
        } else {
            parse_legacy(text)?
        };
        serde_json::from_value(value)
            .map_err(|e| GatewayError::ConfigInvalid(format!("invalid configuration: {e}")))
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.setup.use_cloud {
            let cloud = self.cloud.as_ref();
            let mut error = String::new();
            if cloud.map_or(true, |c| c.endpoint.is_empty()) {
                error.push_str("Missing endpoint in configuration file.\n");
            }
            if cloud.map_or(true, |c| c.root_ca_path.is_empty()) {
                error.push_str(
                    "Missing Root Certification Authority certificate in configuration file.\n",
                );
            }
            if !error.is_empty() {
                return Err(GatewayError::ConfigInvalid(error.trim_end().to_string()));
            }
        }
        Ok(())
    }

    /// Certificate / private key pair installed for a device.
    pub fn device_credentials(&self, device: &str) -> (PathBuf, PathBuf) {
        let dir = &self.setup.device_certificates_path;
        (
            dir.join(format!("{device}{CERTIFICATE_EXT}")),
            dir.join(format!("{device}{PRIVATE_KEY_EXT}")),
        )
    }
}

/// Legacy text format: one `dotted.key = value` per line, `#` comments.
///
/// `setup.devices` entries are flattened as `setup.devices.<n>.name` /
/// `setup.devices.<n>.position`.
fn parse_legacy(text: &str) -> Result<serde_json::Value, GatewayError> {
    let mut root = serde_json::Map::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, raw) = line.split_once('=').ok_or_else(|| {
            GatewayError::ConfigInvalid(format!("line {}: expected `key = value`", lineno + 1))
        })?;
        let value = parse_scalar(raw.trim());
        insert_dotted(&mut root, key.trim(), value);
    }
    Ok(normalize_arrays(serde_json::Value::Object(root)))
}

fn parse_scalar(raw: &str) -> serde_json::Value {
    match raw {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => {
            if let Ok(n) = raw.parse::<i64>() {
                serde_json::Value::Number(n.into())
            } else {
                serde_json::Value::String(raw.trim_matches('"').to_string())
            }
        }
    }
}

fn insert_dotted(root: &mut serde_json::Map<String, serde_json::Value>, key: &str, value: serde_json::Value) {
    let mut current = root;
    let segments: Vec<&str> = key.split('.').collect();
    for segment in &segments[..segments.len() - 1] {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        // A scalar assigned earlier under the same prefix loses to the object.
        if !entry.is_object() {
            *entry = serde_json::Value::Object(serde_json::Map::new());
        }
        match entry.as_object_mut() {
            Some(map) => current = map,
            None => return,
        }
    }
    current.insert(segments[segments.len() - 1].to_string(), value);
}

/// Objects whose keys are all numeric indices become arrays.
fn normalize_arrays(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let all_indices = !map.is_empty() && map.keys().all(|k| k.parse::<usize>().is_ok());
            if all_indices {
                let mut entries: Vec<(usize, serde_json::Value)> = map
                    .into_iter()
                    .map(|(k, v)| (k.parse::<usize>().unwrap_or(0), normalize_arrays(v)))
                    .collect();
                entries.sort_by_key(|(ix, _)| *ix);
                serde_json::Value::Array(entries.into_iter().map(|(_, v)| v).collect())
            } else {
                serde_json::Value::Object(
                    map.into_iter().map(|(k, v)| (k, normalize_arrays(v))).collect(),
                )
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_JSON: &str = r#"{
        "setup": {
            "use_sensors": false,
            "use_cloud": false,
            "use_threads_for_polling_sensors": true,
            "devices": [ { "name": "Sensor1", "position": 1 } ]
        }
    }"#;

    #[test]
    fn minimal_json_gets_defaults() {
        let config = GatewayConfig::parse(MINIMAL_JSON).unwrap();
        assert_eq!(config.serial_port.name, "/dev/ttyUSB0");
        assert_eq!(config.serial_port.baudrate_bits_per_second, 230_400);
        assert_eq!(config.timers.env_seconds, 30);
        assert_eq!(config.timers.tdm_seconds, 30);
        assert_eq!(config.timers.fdm_seconds, 5);
        assert_eq!(config.dump.env_samples, 0);
        assert_eq!(config.setup.devices[0].name, "Sensor1");
    }

    #[test]
    fn cloud_without_endpoint_is_invalid() {
        let text = r#"{
            "setup": {
                "use_sensors": false,
                "use_cloud": true,
                "use_threads_for_polling_sensors": true,
                "devices": []
            },
            "cloud": { "root_ca_path": "/greengrass/certs/root.ca.pem" }
        }"#;
        let config = GatewayConfig::parse(text).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GatewayError::ConfigInvalid(_)));
        assert!(err.to_string().contains("Missing endpoint"));
    }

    #[test]
    fn cloud_without_ca_is_invalid() {
        let text = r#"{
            "setup": {
                "use_sensors": false,
                "use_cloud": true,
                "use_threads_for_polling_sensors": true,
                "devices": []
            },
            "cloud": { "endpoint": "example.iot.amazonaws.com" }
        }"#;
        let err = GatewayConfig::parse(text).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("Root Certification Authority"));
    }

    #[test]
    fn legacy_format_matches_json() {
        let text = "\
# gateway test configuration
serial_port.name = /dev/ttyS2
serial_port.baudrate_bits_per_second = 115200
setup.use_sensors = false
setup.use_cloud = false
setup.use_threads_for_polling_sensors = false
setup.devices.0.name = Sensor1
setup.devices.0.position = 1
setup.devices.1.name = Motor3
setup.devices.1.position = 4
dump.env_samples = 2
";
        let config = GatewayConfig::parse(text).unwrap();
        assert_eq!(config.serial_port.name, "/dev/ttyS2");
        assert_eq!(config.serial_port.baudrate_bits_per_second, 115_200);
        assert!(!config.setup.use_threads_for_polling_sensors);
        assert_eq!(config.setup.devices.len(), 2);
        assert_eq!(config.setup.devices[1].name, "Motor3");
        assert_eq!(config.setup.devices[1].position, 4);
        assert_eq!(config.dump.env_samples, 2);
    }

    #[test]
    fn credentials_follow_device_name() {
        let config = GatewayConfig::parse(MINIMAL_JSON).unwrap();
        let (cert, key) = config.device_credentials("Sensor1");
        assert!(cert.ends_with("Sensor1.cert.pem"));
        assert!(key.ends_with("Sensor1.private.key"));
    }
}
