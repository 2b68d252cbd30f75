//! Builds devices and attributes from configuration.

use tracing::{debug, info, warn};

use crate::address::AddressDescriptor;
use crate::attribute::{Attribute, Direction};
use crate::config::{AddressConfig, AttributeConfig, DeviceConfig, S7Config};
use crate::device::{Device, DeviceRegistry, DeviceType};
use crate::error::AttributeBuildError;
use crate::topic::TopicLayout;
use crate::value::DataKind;

/// Build every configured device.
///
/// Attributes that cannot be created are skipped with a warning; the rest of
/// the device is kept.
pub fn build_registry(config: &S7Config, layout: &TopicLayout) -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();

    for device_config in &config.devices {
        let device = build_device(&registry, device_config, layout, config.retain_messages);
        if device.is_empty() {
            warn!(device = %device.name(), "Device has no usable attributes");
        }
        info!(
            device = %device.name(),
            device_type = device.device_type().as_str(),
            attributes = device.len(),
            "Configured device"
        );
        registry.insert(device);
    }

    registry
}

/// Build one device, picking a topic name not yet used in `registry`.
pub fn build_device(
    registry: &DeviceRegistry,
    config: &DeviceConfig,
    layout: &TopicLayout,
    retain: bool,
) -> Device {
    let requested = config.topic_name();
    let name = registry.unique_name(&requested);
    if name != requested {
        warn!(device = %config.name, requested = %requested, assigned = %name, "Topic name already in use");
    }

    let mut device = Device::new(
        name.clone(),
        config.name.clone(),
        config.device_type,
        layout.device_prefix(&name),
    );

    for (attr_name, address, required) in attribute_specs(config) {
        let topic = layout.state_topic(&name, &attr_name);
        match build_attribute(&attr_name, topic, &address.options(), required, retain) {
            Ok(attribute) => {
                debug!(device = %name, attribute = %attr_name, kind = %attribute.kind(), "Added attribute");
                device.add_attribute(attribute);
            }
            Err(e) => {
                warn!(device = %name, attribute = %attr_name, error = %e, "Skipping attribute");
            }
        }
    }

    device
}

/// Create an attribute from its options.
///
/// The kind comes from the address. When `required` is set the address must
/// resolve to that kind; an attribute with no address at all takes `required`
/// as its kind and has nothing to poll or write until one is configured.
pub fn build_attribute(
    name: &str,
    topic: String,
    options: &AttributeConfig,
    required: Option<DataKind>,
    retain: bool,
) -> Result<Attribute, AttributeBuildError> {
    let read = options.plc.as_deref().map(AddressDescriptor::parse).transpose()?;
    let write = options.set_plc.as_deref().map(AddressDescriptor::parse).transpose()?;

    let kind = read
        .or(write)
        .map(|address| address.kind)
        .or(required)
        .ok_or(AttributeBuildError::NoAddress)?;

    if let (Some(read), Some(write)) = (read, write) {
        if read.kind != write.kind {
            return Err(AttributeBuildError::KindMismatch {
                expected: read.kind,
                found: write.kind,
            });
        }
    }

    match required {
        Some(expected) if expected != kind => {
            return Err(AttributeBuildError::KindMismatch {
                expected,
                found: kind,
            });
        }
        _ => {}
    }

    let direction = options
        .rw
        .as_deref()
        .map(Direction::from_mode)
        .unwrap_or_default();

    let mut attribute = Attribute::new(name, topic, kind)
        .with_direction(direction)
        .with_inverted(options.inverted)
        .with_rounding(options.round)
        .with_write_back(options.write_back)
        .with_min_publish_interval_ms(options.update_interval)
        .with_retain(retain);

    if let Some(address) = read {
        attribute = attribute.with_address(address);
    }
    if let Some(address) = write {
        attribute = attribute.with_set_address(address);
    }
    if let Some(unit) = &options.unit_of_measurement {
        attribute = attribute.with_unit_of_measurement(unit.clone());
    }

    Ok(attribute)
}

/// Attributes a device exposes, with the kind its type requires.
fn attribute_specs(config: &DeviceConfig) -> Vec<(String, &AddressConfig, Option<DataKind>)> {
    let mut specs = Vec::new();

    match config.device_type {
        DeviceType::Light => {
            if let Some(state) = &config.state {
                specs.push(("state".to_string(), state, Some(DataKind::Bit)));
            }
            if let Some(brightness) = &config.brightness {
                specs.push(("brightness".to_string(), brightness, Some(DataKind::Byte)));
            }
        }
        DeviceType::Switch => {
            if let Some(state) = &config.state {
                specs.push(("state".to_string(), state, Some(DataKind::Bit)));
            }
        }
        DeviceType::Sensor => {
            let code = config.state_type.as_deref().unwrap_or("X");
            match (&config.state, code.parse::<DataKind>()) {
                (Some(state), Ok(kind)) => specs.push(("state".to_string(), state, Some(kind))),
                (Some(_), Err(e)) => {
                    warn!(device = %config.name, state_type = %code, error = %e, "Skipping sensor state");
                }
                (None, _) => {}
            }
        }
        DeviceType::Generic => {
            let mut names: Vec<&String> = config.attributes.keys().collect();
            names.sort();
            for name in names {
                specs.push((name.clone(), &config.attributes[name], None));
            }
        }
    }

    specs
}
