//! Routes readings and inbound writes to devices and carries out the results.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::attribute::{ReadingOutcome, WriteRequest};
use crate::device::DeviceRegistry;
use crate::error::DispatchError;
use crate::topic::TopicLayout;
use crate::transport::{ItemWriter, StatePublisher, WriteSubscriber};
use crate::value::DomainValue;

/// Counts from handling one reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    pub published: bool,
    pub written: bool,
}

/// Connects the device registry to the publish and write collaborators.
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    layout: TopicLayout,
    publisher: Arc<dyn StatePublisher>,
    writer: Arc<dyn ItemWriter>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        layout: TopicLayout,
        publisher: Arc<dyn StatePublisher>,
        writer: Arc<dyn ItemWriter>,
    ) -> Self {
        Self {
            registry,
            layout,
            publisher,
            writer,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn layout(&self) -> &TopicLayout {
        &self.layout
    }

    /// Route a controller reading for `topic` and publish/write what it produces.
    pub async fn handle_reading(
        &self,
        topic: &str,
        raw: DomainValue,
        now_ms: u64,
    ) -> Result<Effects, DispatchError> {
        let parts = self
            .layout
            .parse_state(topic)
            .ok_or_else(|| DispatchError::UnknownTopic(topic.to_string()))?;
        let device = self.registry.lookup(parts.device)?;
        let outcome = device.route_reading(parts.attribute, raw, now_ms)?;
        self.execute(outcome).await
    }

    /// Route an inbound write on a `/set` topic and forward it to the controller.
    pub async fn handle_write(&self, topic: &str, payload: &str) -> Result<(), DispatchError> {
        let parts = self
            .layout
            .parse_set(topic)
            .ok_or_else(|| DispatchError::UnknownTopic(topic.to_string()))?;
        let device = self.registry.lookup(parts.device)?;
        let request = device.route_write(parts.attribute, payload)?;

        info!(topic = %request.topic, value = %request.value, "Writing value from set request");
        self.write(request).await
    }

    /// Subscribe to the set topic of every writable attribute. Returns how many succeeded.
    pub async fn subscribe_all(&self, subscriber: &dyn WriteSubscriber) -> usize {
        let mut subscribed = 0;
        for device in self.registry.iter() {
            for topic in device.set_topics() {
                match subscriber.subscribe(&topic).await {
                    Ok(()) => subscribed += 1,
                    Err(e) => warn!(topic = %topic, error = %e, "Failed to subscribe"),
                }
            }
        }
        subscribed
    }

    /// Publish first, then write. Both are attempted; the first failure is returned.
    async fn execute(&self, outcome: ReadingOutcome) -> Result<Effects, DispatchError> {
        let mut effects = Effects::default();
        let mut first_error = None;

        if let Some(publish) = outcome.publish {
            match self
                .publisher
                .publish(&publish.topic, &publish.payload, publish.retain)
                .await
            {
                Ok(()) => {
                    debug!(topic = %publish.topic, payload = %publish.payload, "Published");
                    effects.published = true;
                }
                Err(e) => first_error = Some(DispatchError::from(e)),
            }
        }

        if let Some(write) = outcome.write {
            debug!(topic = %write.topic, value = %write.value, "Writing back");
            match self.write(write).await {
                Ok(()) => effects.written = true,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(effects),
        }
    }

    async fn write(&self, request: WriteRequest) -> Result<(), DispatchError> {
        self.writer
            .write_item(&request.topic, request.value)
            .await
            .map_err(DispatchError::from)
    }
}
