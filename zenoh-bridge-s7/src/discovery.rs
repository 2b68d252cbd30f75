//! Discovery announcements and device availability.
//!
//! Each device is announced once at startup on
//! `<prefix>/<type>/s7-connector/<device>/config` with a JSON document
//! describing its topics and attributes. Internal attributes are left out.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::DiscoveryConfig;
use crate::device::{Device, DeviceRegistry};
use crate::topic::TopicLayout;
use crate::transport::StatePublisher;
use crate::value::DataKind;

/// Availability payload while the bridge runs.
pub const ONLINE: &str = "online";
/// Availability payload after shutdown.
pub const OFFLINE: &str = "offline";

/// Node id segment of discovery topics.
const NODE_ID: &str = "s7-connector";

/// Discovery document for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryMessage {
    pub uniq_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    pub attributes_info: BTreeMap<String, AttributeDiscovery>,
}

/// Per-attribute entry of a discovery document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDiscovery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plc_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_plc_address: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
}

/// `<prefix>/<type>/s7-connector/<device>/config`.
pub fn discovery_topic(prefix: &str, device: &Device) -> String {
    format!(
        "{}/{}/{}/{}/config",
        prefix.trim_end_matches('/'),
        device.device_type().as_str(),
        NODE_ID,
        device.name()
    )
}

/// Build the discovery document of a device.
pub fn discovery_message(device: &Device, layout: &TopicLayout) -> DiscoveryMessage {
    let attributes = device.attributes();
    let state = attributes
        .iter()
        .find(|attr| attr.name == "state" && !attr.direction.is_internal());

    let state_topic = state
        .filter(|attr| attr.direction.publishes())
        .map(|attr| attr.topic.clone());
    let command_topic = state
        .filter(|attr| attr.direction.accepts_writes())
        .map(|attr| format!("{}/set", attr.topic));
    let (payload_on, payload_off) = match state {
        Some(attr) if attr.kind == DataKind::Bit => {
            (Some("true".to_string()), Some("false".to_string()))
        }
        _ => (None, None),
    };

    let attributes_info = attributes
        .iter()
        .filter(|attr| !attr.direction.is_internal())
        .map(|attr| {
            let entry = AttributeDiscovery {
                plc_address: attr.address.map(|a| a.to_string()),
                set_plc_address: attr.write_address.map(|a| a.to_string()),
                kind: attr.kind.code().to_string(),
                unit_of_measurement: attr.unit_of_measurement.clone(),
            };
            (attr.name.clone(), entry)
        })
        .collect();

    DiscoveryMessage {
        uniq_id: format!("s7-{}", device.name()),
        name: device.display_name().to_string(),
        state_topic,
        command_topic,
        payload_on,
        payload_off,
        unit_of_measurement: state.and_then(|attr| attr.unit_of_measurement.clone()),
        availability_topic: layout.availability_topic(device.name()),
        payload_available: ONLINE.to_string(),
        payload_not_available: OFFLINE.to_string(),
        attributes_info,
    }
}

/// Publish a discovery document for every device. Returns how many were sent.
pub async fn announce(
    registry: &DeviceRegistry,
    layout: &TopicLayout,
    config: &DiscoveryConfig,
    publisher: &dyn StatePublisher,
) -> usize {
    if !config.enabled {
        return 0;
    }

    let mut sent = 0;
    for name in registry.names() {
        let Some(device) = registry.get(&name) else {
            continue;
        };
        let topic = discovery_topic(&config.prefix, device);
        let payload = match serde_json::to_string(&discovery_message(device, layout)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(device = %name, error = %e, "Failed to serialize discovery message");
                continue;
            }
        };
        match publisher.publish(&topic, &payload, config.retain).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(device = %name, error = %e, "Failed to publish discovery message"),
        }
    }

    info!(devices = sent, prefix = %config.prefix, "Published discovery messages");
    sent
}

/// Publish `payload` on every device's availability topic, retained.
pub async fn publish_availability(
    registry: &DeviceRegistry,
    layout: &TopicLayout,
    publisher: &dyn StatePublisher,
    payload: &str,
) -> usize {
    let mut sent = 0;
    for name in registry.names() {
        let topic = layout.availability_topic(&name);
        match publisher.publish(&topic, payload, true).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(device = %name, error = %e, "Failed to publish availability"),
        }
    }
    sent
}
