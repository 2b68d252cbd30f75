//! Controller client.
//!
//! [`PlcClient`] maps state topics to data block addresses and implements the
//! bulk-read and write collaborators on top of raw area access
//! ([`DataBlockAccess`]). [`MemoryDataBlocks`] is an in-process data block
//! image that serves as the access backend for simulation and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use crate::address::AddressDescriptor;
use crate::codec::{decode_wire, encode_wire};
use crate::device::Device;
use crate::error::CollaboratorError;
use crate::transport::{BulkReader, ItemWriter};
use crate::value::{DataKind, DomainValue};

/// Raw byte access to data blocks.
#[async_trait]
pub trait DataBlockAccess: Send + Sync {
    async fn read_area(&self, block: u32, start: u32, size: usize) -> Result<Vec<u8>, CollaboratorError>;

    async fn write_area(&self, block: u32, start: u32, data: &[u8]) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone, Copy, Default)]
struct PlcItem {
    read: Option<AddressDescriptor>,
    write: Option<AddressDescriptor>,
}

/// Topic-addressed reads and writes against a data block backend.
pub struct PlcClient {
    access: Arc<dyn DataBlockAccess>,
    items: RwLock<HashMap<String, PlcItem>>,
}

impl PlcClient {
    pub fn new(access: Arc<dyn DataBlockAccess>) -> Self {
        Self {
            access,
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Associate a topic with the address it is polled from and the one it is written to.
    pub fn register(
        &self,
        topic: impl Into<String>,
        read: Option<AddressDescriptor>,
        write: Option<AddressDescriptor>,
    ) {
        self.items
            .write()
            .insert(topic.into(), PlcItem { read, write });
    }

    /// Register every addressed attribute of a device. Returns how many were registered.
    pub fn register_device(&self, device: &Device) -> usize {
        let mut count = 0;
        for attr in device.attributes() {
            let read = attr.address.filter(|_| attr.direction.publishes());
            let write = attr.write_address.filter(|_| attr.direction.accepts_writes());
            if read.is_none() && write.is_none() {
                continue;
            }
            self.register(attr.topic, read, write);
            count += 1;
        }
        count
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    async fn read_address(&self, address: &AddressDescriptor) -> Result<DomainValue, CollaboratorError> {
        let raw = self
            .access
            .read_area(address.block, address.byte_offset, address.kind.width())
            .await?;
        decode_wire(&raw, address).map_err(|e| CollaboratorError::Read {
            item: address.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl BulkReader for PlcClient {
    async fn read_all(&self) -> Result<HashMap<String, DomainValue>, CollaboratorError> {
        let polled: Vec<(String, AddressDescriptor)> = self
            .items
            .read()
            .iter()
            .filter_map(|(topic, item)| item.read.map(|addr| (topic.clone(), addr)))
            .collect();

        let mut values = HashMap::with_capacity(polled.len());
        for (topic, address) in polled {
            match self.read_address(&address).await {
                Ok(value) => {
                    values.insert(topic, value);
                }
                Err(e) => {
                    error!(topic = %topic, address = %address, error = %e, "Failed to read address");
                }
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl ItemWriter for PlcClient {
    async fn write_item(&self, topic: &str, value: DomainValue) -> Result<(), CollaboratorError> {
        let address = self
            .items
            .read()
            .get(topic)
            .and_then(|item| item.write)
            .ok_or_else(|| CollaboratorError::UnknownItem(topic.to_string()))?;

        let existing = if address.kind == DataKind::Bit {
            let current = self.access.read_area(address.block, address.byte_offset, 1).await?;
            current.first().copied()
        } else {
            None
        };

        let bytes = encode_wire(&value, &address, existing).map_err(|e| CollaboratorError::Write {
            item: address.to_string(),
            message: e.to_string(),
        })?;

        self.access
            .write_area(address.block, address.byte_offset, &bytes)
            .await?;

        debug!(topic = %topic, address = %address, value = %value, "Wrote item");
        Ok(())
    }
}

/// Data blocks held in memory.
#[derive(Debug, Default)]
pub struct MemoryDataBlocks {
    blocks: Mutex<HashMap<u32, Vec<u8>>>,
}

impl MemoryDataBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or resize) block `number` with `size` zeroed bytes.
    pub fn add_block(&self, number: u32, size: usize) {
        self.blocks.lock().entry(number).or_default().resize(size, 0);
    }

    /// Copy of a whole block.
    pub fn snapshot(&self, number: u32) -> Option<Vec<u8>> {
        self.blocks.lock().get(&number).cloned()
    }

    fn range(
        blocks: &HashMap<u32, Vec<u8>>,
        block: u32,
        start: u32,
        size: usize,
    ) -> Result<std::ops::Range<usize>, String> {
        let data = blocks
            .get(&block)
            .ok_or_else(|| format!("data block DB{} does not exist", block))?;
        let start = start as usize;
        let end = start.saturating_add(size);
        if end > data.len() {
            return Err(format!(
                "bytes {}..{} outside DB{} (size {})",
                start,
                end,
                block,
                data.len()
            ));
        }
        Ok(start..end)
    }
}

#[async_trait]
impl DataBlockAccess for MemoryDataBlocks {
    async fn read_area(&self, block: u32, start: u32, size: usize) -> Result<Vec<u8>, CollaboratorError> {
        let blocks = self.blocks.lock();
        let range = Self::range(&blocks, block, start, size).map_err(|message| {
            CollaboratorError::Read {
                item: format!("DB{}.{}", block, start),
                message,
            }
        })?;
        Ok(blocks[&block][range].to_vec())
    }

    async fn write_area(&self, block: u32, start: u32, data: &[u8]) -> Result<(), CollaboratorError> {
        let mut blocks = self.blocks.lock();
        let range = Self::range(&blocks, block, start, data.len()).map_err(|message| {
            CollaboratorError::Write {
                item: format!("DB{}.{}", block, start),
                message,
            }
        })?;
        if let Some(bytes) = blocks.get_mut(&block) {
            bytes[range].copy_from_slice(data);
        }
        Ok(())
    }
}
