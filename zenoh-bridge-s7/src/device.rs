//! Devices: named groups of attributes sharing a topic namespace.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::address::AddressDescriptor;
use crate::attribute::{Attribute, Direction, ReadingOutcome, WriteRequest};
use crate::error::DispatchError;
use crate::value::{DataKind, DomainValue};

/// Kind of device, which decides the attributes it exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// `state` (bit) and optional `brightness` (byte).
    Light,
    /// `state` (bit).
    Switch,
    /// `state` of a configurable kind.
    Sensor,
    /// Free-form attribute map. Unrecognised types fall back to this.
    #[default]
    #[serde(other)]
    Generic,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Light => "light",
            DeviceType::Switch => "switch",
            DeviceType::Sensor => "sensor",
            DeviceType::Generic => "generic",
        }
    }
}

/// Read-only view of an attribute's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub topic: String,
    pub kind: DataKind,
    pub address: Option<AddressDescriptor>,
    pub write_address: Option<AddressDescriptor>,
    pub direction: Direction,
    pub unit_of_measurement: Option<String>,
}

impl From<&Attribute> for AttributeInfo {
    fn from(attr: &Attribute) -> Self {
        Self {
            name: attr.name().to_string(),
            topic: attr.topic().to_string(),
            kind: attr.kind(),
            address: attr.address().copied(),
            write_address: attr.write_address().copied(),
            direction: attr.direction(),
            unit_of_measurement: attr.unit_of_measurement().map(str::to_string),
        }
    }
}

/// A device and the attributes it owns.
///
/// Each attribute sits behind its own lock so the poll loop and inbound
/// writes can touch different attributes of the same device concurrently.
#[derive(Debug)]
pub struct Device {
    name: String,
    display_name: String,
    device_type: DeviceType,
    topic_prefix: String,
    attributes: HashMap<String, Mutex<Attribute>>,
}

impl Device {
    /// `name` is the topic segment; `display_name` is the human-readable name.
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        device_type: DeviceType,
        topic_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            device_type,
            topic_prefix: topic_prefix.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// `<base>/<device>`.
    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    /// Add an attribute. Returns `false` and keeps the existing one if the name is taken.
    pub fn add_attribute(&mut self, attribute: Attribute) -> bool {
        if self.attributes.contains_key(attribute.name()) {
            return false;
        }
        self.attributes
            .insert(attribute.name().to_string(), Mutex::new(attribute));
        true
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// Feed a controller reading to the named attribute.
    pub fn route_reading(
        &self,
        attribute: &str,
        raw: DomainValue,
        now_ms: u64,
    ) -> Result<ReadingOutcome, DispatchError> {
        let attr = self.lookup(attribute)?;
        let outcome = attr.lock().on_reading(raw, now_ms)?;
        Ok(outcome)
    }

    /// Feed an inbound write payload to the named attribute.
    pub fn route_write(&self, attribute: &str, text: &str) -> Result<WriteRequest, DispatchError> {
        self.lookup(attribute)?.lock().on_write(text)
    }

    /// Polled address of an attribute.
    pub fn address(&self, attribute: &str) -> Option<AddressDescriptor> {
        self.attributes
            .get(attribute)
            .and_then(|attr| attr.lock().address().copied())
    }

    /// Address writes to an attribute go to.
    pub fn write_address(&self, attribute: &str) -> Option<AddressDescriptor> {
        self.attributes
            .get(attribute)
            .and_then(|attr| attr.lock().write_address().copied())
    }

    /// Configuration of every attribute, sorted by name.
    pub fn attributes(&self) -> Vec<AttributeInfo> {
        let mut infos: Vec<AttributeInfo> = self
            .attributes
            .values()
            .map(|attr| AttributeInfo::from(&*attr.lock()))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Set topics of the attributes that accept writes.
    pub fn set_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .attributes
            .values()
            .filter_map(|attr| {
                let attr = attr.lock();
                attr.direction().accepts_writes().then(|| attr.set_topic())
            })
            .collect();
        topics.sort();
        topics
    }

    fn lookup(&self, attribute: &str) -> Result<&Mutex<Attribute>, DispatchError> {
        self.attributes
            .get(attribute)
            .ok_or_else(|| DispatchError::UnknownAttribute {
                device: self.name.clone(),
                attribute: attribute.to_string(),
            })
    }
}

/// All devices of the bridge, keyed by topic name.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name`, or `name-1`, `name-2`, ... if already taken.
    pub fn unique_name(&self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut index = 1;
        while self.devices.contains_key(&candidate) {
            candidate = format!("{}-{}", name, index);
            index += 1;
        }
        candidate
    }

    /// Register a device under its name, replacing any previous one.
    pub fn insert(&mut self, device: Device) -> Option<Device> {
        self.devices.insert(device.name().to_string(), device)
    }

    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&Device, DispatchError> {
        self.get(name)
            .ok_or_else(|| DispatchError::UnknownDevice(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Device names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
