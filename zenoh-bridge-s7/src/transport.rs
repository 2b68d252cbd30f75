//! Collaborator interfaces between the core and the outside world.
//!
//! The controller side implements [`BulkReader`] and [`ItemWriter`]; the
//! messaging side implements [`StatePublisher`] and [`WriteSubscriber`].
//! Implementations are handed to the dispatcher and poller at construction.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::value::DomainValue;

/// Reads every registered item from the controller in one go.
#[async_trait]
pub trait BulkReader: Send + Sync {
    /// Current value per state topic. Items that failed to read are absent.
    async fn read_all(&self) -> Result<HashMap<String, DomainValue>, CollaboratorError>;
}

/// Writes one value to the controller.
#[async_trait]
pub trait ItemWriter: Send + Sync {
    async fn write_item(&self, topic: &str, value: DomainValue) -> Result<(), CollaboratorError>;
}

/// Publishes state text on the messaging side.
#[async_trait]
pub trait StatePublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), CollaboratorError>;
}

/// Registers interest in inbound writes on a topic pattern.
#[async_trait]
pub trait WriteSubscriber: Send + Sync {
    async fn subscribe(&self, pattern: &str) -> Result<(), CollaboratorError>;
}
