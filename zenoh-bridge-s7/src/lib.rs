//! Zenoh bridge for Siemens S7 data blocks.
//!
//! The bridge polls data block addresses, publishes changed values as text
//! and writes values received on `/set` topics back to the controller.
//!
//! # Topics
//!
//! ```text
//! <prefix>/<device>/<attribute>          state (text)
//! <prefix>/<device>/<attribute>/set      writes (put, or query for an acknowledgment)
//! <prefix>/<device>/availability         online / offline
//! <prefix>/@/status                      bridge status (JSON)
//! ```
//!
//! Addresses use the `DB<n>.<KIND><byte>[.<bit>]` form, e.g. `DB1.DBX0.3`
//! or `DB2.DBR8`.

pub mod address;
pub mod attribute;
pub mod codec;
pub mod config;
pub mod device;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod plc;
pub mod poller;
pub mod topic;
pub mod transport;
pub mod value;
pub mod zenoh_io;

pub use address::AddressDescriptor;
pub use attribute::{Attribute, Direction, PublishRequest, ReadingOutcome, WriteRequest};
pub use config::S7BridgeConfig;
pub use device::{Device, DeviceRegistry, DeviceType};
pub use dispatch::{Dispatcher, Effects};
pub use error::{AddressError, AttributeBuildError, CodecError, CollaboratorError, DispatchError};
pub use plc::{DataBlockAccess, MemoryDataBlocks, PlcClient};
pub use poller::{CycleStats, Poller};
pub use topic::TopicLayout;
pub use transport::{BulkReader, ItemWriter, StatePublisher, WriteSubscriber};
pub use value::{DataKind, DomainValue};
