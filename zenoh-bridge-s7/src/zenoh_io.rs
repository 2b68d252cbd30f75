//! Zenoh side of the bridge.
//!
//! Implements the messaging collaborators on the framework's [`Publisher`]
//! and [`SetListener`], and drains the listener's channel into the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use s7_bridge_framework::{InboundWrite, Publisher, SetListener};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::CollaboratorError;
use crate::transport::{StatePublisher, WriteSubscriber};

#[async_trait]
impl StatePublisher for Publisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), CollaboratorError> {
        Publisher::publish(self, topic, payload, retain)
            .await
            .map_err(|e| CollaboratorError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl WriteSubscriber for SetListener {
    async fn subscribe(&self, pattern: &str) -> Result<(), CollaboratorError> {
        self.listen(pattern)
            .await
            .map_err(|e| CollaboratorError::Subscribe {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }
}

/// Hand every inbound write to the dispatcher until the channel closes.
///
/// Requests that came in as queries are answered with the outcome; failed
/// plain puts are only logged.
pub async fn serve_writes(dispatcher: Arc<Dispatcher>, mut requests: mpsc::Receiver<InboundWrite>) {
    info!("Handling inbound writes");

    while let Some(request) = requests.recv().await {
        let outcome = dispatcher.handle_write(&request.key, &request.payload).await;
        match &outcome {
            Ok(()) => debug!(key = %request.key, payload = %request.payload, "Write handled"),
            Err(e) => warn!(key = %request.key, payload = %request.payload, error = %e, "Write refused"),
        }
        request.respond(outcome.map_err(|e| e.to_string()));
    }

    debug!("Inbound write channel closed");
}
