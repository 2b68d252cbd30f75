//! Configuration for the S7 bridge.

use std::collections::{HashMap, HashSet};

use s7_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, Result, ZenohConfig};
use serde::{Deserialize, Serialize};

use crate::device::DeviceType;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S7BridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Controller access
    #[serde(default)]
    pub plc: PlcConfig,

    /// Topics and devices
    pub s7: S7Config,

    /// Discovery announcements
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlcConfig {
    /// Delay between poll cycles in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Data blocks held by the in-memory controller image
    #[serde(default)]
    pub data_blocks: Vec<DataBlockConfig>,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            data_blocks: Vec::new(),
        }
    }
}

/// One data block of the controller image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBlockConfig {
    /// Block number (`DB<number>`)
    pub number: u32,
    /// Size in bytes
    pub size: usize,
}

/// Topic prefix and device list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S7Config {
    /// Topic prefix (default: "s7")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Publish state topics as retained
    #[serde(default)]
    pub retain_messages: bool,

    /// Devices to expose
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_key_prefix() -> String {
    "s7".to_string()
}

/// Configuration for a single device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name
    pub name: String,

    /// Device type (light, switch, sensor, generic)
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,

    /// Topic segment override; derived from the name when absent
    #[serde(default, alias = "mqtt")]
    pub topic: Option<String>,

    /// `state` attribute (light, switch, sensor)
    #[serde(default)]
    pub state: Option<AddressConfig>,

    /// `brightness` attribute (light)
    #[serde(default)]
    pub brightness: Option<AddressConfig>,

    /// Kind code of a sensor's `state` (default "X")
    #[serde(default)]
    pub state_type: Option<String>,

    /// Free attribute map (generic)
    #[serde(default)]
    pub attributes: HashMap<String, AddressConfig>,
}

impl DeviceConfig {
    /// Topic segment: the `topic` override, else the lower-cased name with
    /// spaces and slashes replaced by dashes.
    pub fn topic_name(&self) -> String {
        match &self.topic {
            Some(name) => name.clone(),
            None => self.name.to_lowercase().replace([' ', '/'], "-"),
        }
    }
}

/// An attribute's address, either as a bare string or with options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressConfig {
    /// `"DB1.DBX0.0"`
    Address(String),
    /// `{ plc: "DB1.DBX0.0", set_plc: "DB1.DBX0.1", rw: "w" }`
    Detailed(AttributeConfig),
}

impl AddressConfig {
    /// Options with defaults filled in for the bare form.
    pub fn options(&self) -> AttributeConfig {
        match self {
            AddressConfig::Address(address) => AttributeConfig {
                plc: Some(address.clone()),
                ..AttributeConfig::default()
            },
            AddressConfig::Detailed(options) => options.clone(),
        }
    }
}

/// Per-attribute options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Address polled for state
    #[serde(default)]
    pub plc: Option<String>,

    /// Address written to; defaults to `plc`
    #[serde(default)]
    pub set_plc: Option<String>,

    /// "r" read only, "w" write only, "i" internal, anything else read-write
    #[serde(default)]
    pub rw: Option<String>,

    /// Publish at most once per interval (milliseconds) instead of on change; 0 disables
    #[serde(default)]
    pub update_interval: u64,

    /// Invert bit values
    #[serde(default)]
    pub inverted: bool,

    /// Write every published value back to the controller
    #[serde(default)]
    pub write_back: bool,

    /// Unit for discovery
    #[serde(default)]
    pub unit_of_measurement: Option<String>,

    /// Round reals to three decimals
    #[serde(default = "default_round")]
    pub round: bool,
}

fn default_round() -> bool {
    true
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            plc: None,
            set_plc: None,
            rw: None,
            update_interval: 0,
            inverted: false,
            write_back: false,
            unit_of_measurement: None,
            round: default_round(),
        }
    }
}

/// Discovery announcements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_enabled")]
    pub enabled: bool,

    /// Topic prefix (default: "homeassistant")
    #[serde(default = "default_discovery_prefix")]
    pub prefix: String,

    /// Publish announcements as retained
    #[serde(default)]
    pub retain: bool,
}

fn default_discovery_enabled() -> bool {
    true
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_discovery_enabled(),
            prefix: default_discovery_prefix(),
            retain: false,
        }
    }
}

fn check_prefix(field: &str, prefix: &str) -> Result<()> {
    if prefix.trim_matches('/').is_empty() {
        return Err(BridgeError::validation(format!("{} cannot be empty", field)));
    }
    if prefix.contains(['*', '$', '#', '?']) {
        return Err(BridgeError::validation(format!(
            "{} '{}' must not contain wildcards",
            field, prefix
        )));
    }
    Ok(())
}

/// Attribute names that collide with keys the bridge publishes or listens on.
const RESERVED_ATTRIBUTES: [&str; 2] = ["availability", "set"];

/// A single key segment: non-empty, no separators, no wildcards and not a
/// verbatim `@` chunk.
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('@')
        && !segment.contains(['/', '*', '$', '#', '?'])
}

impl BridgeConfig for S7BridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.s7.key_prefix
    }

    fn validate(&self) -> Result<()> {
        check_prefix("s7.key_prefix", &self.s7.key_prefix)?;

        if self.discovery.enabled {
            check_prefix("discovery.prefix", &self.discovery.prefix)?;
        }

        if self.plc.poll_interval_ms == 0 {
            return Err(BridgeError::validation(
                "plc.poll_interval_ms must be greater than 0",
            ));
        }

        let mut blocks = HashSet::new();
        for block in &self.plc.data_blocks {
            if block.size == 0 {
                return Err(BridgeError::validation(format!(
                    "Data block DB{}: size must be greater than 0",
                    block.number
                )));
            }
            if !blocks.insert(block.number) {
                return Err(BridgeError::validation(format!(
                    "Data block DB{} is configured twice",
                    block.number
                )));
            }
        }

        if self.s7.devices.is_empty() {
            return Err(BridgeError::validation(
                "At least one device must be configured",
            ));
        }

        for device in &self.s7.devices {
            if device.name.trim().is_empty() {
                return Err(BridgeError::validation("Device name cannot be empty"));
            }
            let topic_name = device.topic_name();
            if !is_valid_segment(&topic_name) {
                return Err(BridgeError::validation(format!(
                    "Device '{}': invalid topic name '{}'",
                    device.name, topic_name
                )));
            }
            for name in device.attributes.keys() {
                if !is_valid_segment(name) || RESERVED_ATTRIBUTES.contains(&name.as_str()) {
                    return Err(BridgeError::validation(format!(
                        "Device '{}': invalid attribute name '{}'",
                        device.name, name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        zenoh: { mode: "peer" },
        plc: {
            poll_interval_ms: 500,
            data_blocks: [ { number: 1, size: 64 } ],
        },
        s7: {
            key_prefix: "plant/s7",
            retain_messages: true,
            devices: [
                { name: "Kitchen Light", type: "light", state: "DB1.DBX0.0", brightness: "DB1.DBB1" },
                {
                    name: "Boiler",
                    type: "generic",
                    attributes: {
                        temperature: { plc: "DB1.DBR2", rw: "r", update_interval: 5000, unit_of_measurement: "°C" },
                        setpoint: { plc: "DB1.DBR6", set_plc: "DB1.DBR10", round: false },
                    },
                },
            ],
        },
        discovery: { prefix: "ha", retain: true },
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = S7BridgeConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.plc.poll_interval_ms, 500);
        assert_eq!(config.plc.data_blocks, vec![DataBlockConfig { number: 1, size: 64 }]);
        assert_eq!(config.key_prefix(), "plant/s7");
        assert!(config.s7.retain_messages);
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.prefix, "ha");

        let light = &config.s7.devices[0];
        assert_eq!(light.device_type, DeviceType::Light);
        assert_eq!(light.state, Some(AddressConfig::Address("DB1.DBX0.0".to_string())));

        let boiler = &config.s7.devices[1];
        let temperature = boiler.attributes["temperature"].options();
        assert_eq!(temperature.rw.as_deref(), Some("r"));
        assert_eq!(temperature.update_interval, 5000);
        assert!(temperature.round);
        let setpoint = boiler.attributes["setpoint"].options();
        assert_eq!(setpoint.set_plc.as_deref(), Some("DB1.DBR10"));
        assert!(!setpoint.round);
    }

    #[test]
    fn test_defaults() {
        let config = S7BridgeConfig::parse(
            r#"{ s7: { devices: [ { name: "pump", state: "DB1.DBX0.0" } ] } }"#,
        )
        .unwrap();

        assert_eq!(config.zenoh.mode, "peer");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.plc.poll_interval_ms, 1000);
        assert_eq!(config.s7.key_prefix, "s7");
        assert!(!config.s7.retain_messages);
        assert_eq!(config.s7.devices[0].device_type, DeviceType::Generic);
        assert_eq!(config.discovery.prefix, "homeassistant");
        assert!(!config.discovery.retain);
    }

    #[test]
    fn test_unknown_device_type_is_generic() {
        let config = S7BridgeConfig::parse(
            r#"{ s7: { devices: [ { name: "fan", type: "climate" } ] } }"#,
        )
        .unwrap();
        assert_eq!(config.s7.devices[0].device_type, DeviceType::Generic);
    }

    #[test]
    fn test_topic_name() {
        let config = S7BridgeConfig::parse(
            r#"{ s7: { devices: [
                { name: "Hall / Stairs Light" },
                { name: "Kitchen", topic: "kitchen-main" },
            ] } }"#,
        )
        .unwrap();
        assert_eq!(config.s7.devices[0].topic_name(), "hall---stairs-light");
        assert_eq!(config.s7.devices[1].topic_name(), "kitchen-main");
    }

    #[test]
    fn test_mqtt_alias_for_topic_override() {
        let config = S7BridgeConfig::parse(r#"{ s7: { devices: [ { name: "Boiler", mqtt: "boiler-1" } ] } }"#)
            .unwrap();
        assert_eq!(config.s7.devices[0].topic.as_deref(), Some("boiler-1"));
        assert_eq!(config.s7.devices[0].topic_name(), "boiler-1");
    }

    #[test]
    fn test_bare_address_options() {
        let options = AddressConfig::Address("DB2.DBW4".to_string()).options();
        assert_eq!(options.plc.as_deref(), Some("DB2.DBW4"));
        assert!(options.set_plc.is_none());
        assert!(options.round);
        assert!(!options.write_back);
    }

    #[test]
    fn test_validate_rejects() {
        let cases = [
            r#"{ s7: { devices: [] } }"#,
            r#"{ s7: { key_prefix: "", devices: [ { name: "a" } ] } }"#,
            r#"{ s7: { key_prefix: "s7/*", devices: [ { name: "a" } ] } }"#,
            r#"{ plc: { poll_interval_ms: 0 }, s7: { devices: [ { name: "a" } ] } }"#,
            r#"{ plc: { data_blocks: [ { number: 1, size: 0 } ] }, s7: { devices: [ { name: "a" } ] } }"#,
            r#"{ plc: { data_blocks: [ { number: 1, size: 4 }, { number: 1, size: 8 } ] }, s7: { devices: [ { name: "a" } ] } }"#,
            r#"{ s7: { devices: [ { name: " " } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", topic: "x/y" } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", topic: "" } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", topic: "x*" } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", mqtt: "x/y" } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { "temp/inner": "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { "": "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { "t*": "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { "t$": "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { "t#": "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { "t?": "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { "@t": "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { availability: "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a", attributes: { set: "DB1.DBB0" } } ] } }"#,
            r#"{ s7: { devices: [ { name: "a" } ] }, discovery: { prefix: "" } }"#,
        ];
        for case in cases {
            let err = S7BridgeConfig::parse(case).unwrap_err();
            assert!(
                matches!(err, BridgeError::ConfigValidation(_)),
                "expected validation error for {}: {:?}",
                case,
                err
            );
        }
    }

    #[test]
    fn test_disabled_discovery_skips_prefix_check() {
        let config = S7BridgeConfig::parse(
            r#"{ s7: { devices: [ { name: "a" } ] }, discovery: { enabled: false, prefix: "" } }"#,
        );
        assert!(config.is_ok());
    }

    #[test]
    fn test_missing_s7_section() {
        let err = S7BridgeConfig::parse(r#"{ zenoh: { mode: "client" } }"#).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigParse(_)));
    }
}
