//! Per-value state machine.
//!
//! An [`Attribute`] turns controller readings into publish decisions and
//! inbound text into register writes. It holds the last published value for
//! deduplication and a single-slot echo marker (`last_written`) that keeps a
//! value we just wrote from being written back again when it is read back.

use crate::address::AddressDescriptor;
use crate::codec::decode_text;
use crate::error::{CodecError, DispatchError};
use crate::value::{DataKind, DomainValue};

/// Which way values flow for an attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Published and writable.
    #[default]
    ReadWrite,
    /// Published only (`rw: "r"`).
    ReadOnly,
    /// Writable only (`rw: "w"`).
    WriteOnly,
    /// Writable only and hidden from discovery (`rw: "i"`).
    Internal,
}

impl Direction {
    /// Interpret an `rw` mode string; unknown modes mean read-write.
    pub fn from_mode(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "r" => Direction::ReadOnly,
            "w" => Direction::WriteOnly,
            "i" => Direction::Internal,
            _ => Direction::ReadWrite,
        }
    }

    pub fn publishes(self) -> bool {
        matches!(self, Direction::ReadWrite | Direction::ReadOnly)
    }

    pub fn accepts_writes(self) -> bool {
        !matches!(self, Direction::ReadOnly)
    }

    pub fn is_internal(self) -> bool {
        self == Direction::Internal
    }
}

/// A message to publish on the attribute's state topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// A value to write to the controller for the attribute's topic.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub topic: String,
    pub value: DomainValue,
}

/// What handling one reading produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingOutcome {
    pub publish: Option<PublishRequest>,
    pub write: Option<WriteRequest>,
}

impl ReadingOutcome {
    pub fn is_empty(&self) -> bool {
        self.publish.is_none() && self.write.is_none()
    }
}

/// One tracked value of a device.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    topic: String,
    kind: DataKind,
    address: Option<AddressDescriptor>,
    set_address: Option<AddressDescriptor>,
    direction: Direction,
    inverted: bool,
    rounding: bool,
    write_back: bool,
    min_publish_interval_ms: u64,
    retain: bool,
    unit_of_measurement: Option<String>,

    last_published: Option<DomainValue>,
    last_published_at_ms: Option<u64>,
    last_written: Option<DomainValue>,
}

impl Attribute {
    /// Create a read-write attribute publishing on `topic`, with rounding on.
    pub fn new(name: impl Into<String>, topic: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            kind,
            address: None,
            set_address: None,
            direction: Direction::default(),
            inverted: false,
            rounding: true,
            write_back: false,
            min_publish_interval_ms: 0,
            retain: false,
            unit_of_measurement: None,
            last_published: None,
            last_published_at_ms: None,
            last_written: None,
        }
    }

    pub fn with_address(mut self, address: AddressDescriptor) -> Self {
        self.address = Some(address);
        self
    }

    /// Write to a different address than the one that is read.
    pub fn with_set_address(mut self, address: AddressDescriptor) -> Self {
        self.set_address = Some(address);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub fn with_rounding(mut self, rounding: bool) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_write_back(mut self, write_back: bool) -> Self {
        self.write_back = write_back;
        self
    }

    /// Publish at most once per interval instead of on change. 0 disables.
    pub fn with_min_publish_interval_ms(mut self, interval_ms: u64) -> Self {
        self.min_publish_interval_ms = interval_ms;
        self
    }

    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn with_unit_of_measurement(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// State topic, `<base>/<device>/<attribute>`.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Topic inbound writes arrive on.
    pub fn set_topic(&self) -> String {
        format!("{}/set", self.topic)
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Address that is polled, if any.
    pub fn address(&self) -> Option<&AddressDescriptor> {
        self.address.as_ref()
    }

    /// Address writes go to: the set address, else the read address.
    pub fn write_address(&self) -> Option<&AddressDescriptor> {
        self.set_address.as_ref().or(self.address.as_ref())
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.unit_of_measurement.as_deref()
    }

    pub fn last_published(&self) -> Option<DomainValue> {
        self.last_published
    }

    pub fn last_published_at_ms(&self) -> Option<u64> {
        self.last_published_at_ms
    }

    /// Pending echo of a value written from the messaging side.
    pub fn last_written(&self) -> Option<DomainValue> {
        self.last_written
    }

    /// Handle a value read from the controller at `now_ms` (monotonic milliseconds).
    pub fn on_reading(&mut self, raw: DomainValue, now_ms: u64) -> Result<ReadingOutcome, CodecError> {
        if !self.direction.publishes() {
            return Ok(ReadingOutcome::default());
        }
        if raw.kind() != self.kind {
            return Err(CodecError::KindMismatch {
                expected: self.kind,
                found: raw.kind(),
            });
        }

        let value = self.normalize(raw);
        if !self.should_publish(&value, now_ms) {
            return Ok(ReadingOutcome::default());
        }

        self.last_published = Some(value);
        self.last_published_at_ms = Some(self.last_published_at_ms.map_or(now_ms, |t| t.max(now_ms)));

        let mut outcome = ReadingOutcome {
            publish: Some(PublishRequest {
                topic: self.topic.clone(),
                payload: value.to_string(),
                retain: self.retain,
            }),
            write: None,
        };

        if self.write_back && self.direction.accepts_writes() {
            if self.last_written == Some(value) {
                // Our own write came back; consume it instead of writing again.
                self.last_written = None;
            } else {
                outcome.write = Some(WriteRequest {
                    topic: self.topic.clone(),
                    value,
                });
            }
        }

        Ok(outcome)
    }

    /// Handle a write payload from the messaging side.
    ///
    /// The decoded value is kept as the echo marker without rounding, so a
    /// Real written with more than three decimals never matches its rounded
    /// read-back and write-back sends the rounded value once.
    pub fn on_write(&mut self, text: &str) -> Result<WriteRequest, DispatchError> {
        if !self.direction.accepts_writes() {
            return Err(DispatchError::WriteDisabled(self.topic.clone()));
        }

        let value = decode_text(text, self.kind)?;
        self.last_written = Some(value);

        Ok(WriteRequest {
            topic: self.topic.clone(),
            value,
        })
    }

    fn normalize(&self, raw: DomainValue) -> DomainValue {
        match raw {
            DomainValue::Real(v) if self.rounding && v.is_finite() => {
                DomainValue::Real(((v as f64 * 1000.0).round() / 1000.0) as f32)
            }
            DomainValue::Bit(v) if self.inverted => DomainValue::Bit(!v),
            other => other,
        }
    }

    fn should_publish(&self, value: &DomainValue, now_ms: u64) -> bool {
        if self.min_publish_interval_ms > 0 {
            match self.last_published_at_ms {
                None => true,
                Some(last) => now_ms.saturating_sub(last) > self.min_publish_interval_ms,
            }
        } else {
            self.last_published.as_ref() != Some(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit_attr() -> Attribute {
        Attribute::new("state", "s7/lamp/state", DataKind::Bit)
            .with_address(AddressDescriptor::parse("DB1.DBX0.0").unwrap())
    }

    #[test]
    fn test_direction_modes() {
        assert_eq!(Direction::from_mode("r"), Direction::ReadOnly);
        assert_eq!(Direction::from_mode("W"), Direction::WriteOnly);
        assert_eq!(Direction::from_mode("i"), Direction::Internal);
        assert_eq!(Direction::from_mode("rw"), Direction::ReadWrite);
        assert!(Direction::Internal.accepts_writes());
        assert!(!Direction::Internal.publishes());
        assert!(!Direction::ReadOnly.accepts_writes());
    }

    #[test]
    fn test_first_reading_publishes() {
        let mut attr = bit_attr();
        let outcome = attr.on_reading(DomainValue::Bit(true), 0).unwrap();
        assert_eq!(
            outcome.publish,
            Some(PublishRequest {
                topic: "s7/lamp/state".to_string(),
                payload: "true".to_string(),
                retain: false,
            })
        );
        assert!(outcome.write.is_none());
        assert_eq!(attr.last_published(), Some(DomainValue::Bit(true)));
    }

    #[test]
    fn test_dedup_by_value() {
        let mut attr = bit_attr();
        assert!(attr.on_reading(DomainValue::Bit(true), 0).unwrap().publish.is_some());
        assert!(attr.on_reading(DomainValue::Bit(true), 10).unwrap().is_empty());
        assert!(attr.on_reading(DomainValue::Bit(false), 20).unwrap().publish.is_some());
    }

    #[test]
    fn test_dedup_by_time() {
        let mut attr = Attribute::new("temp", "s7/boiler/temp", DataKind::Real)
            .with_min_publish_interval_ms(1000);

        let a = attr.on_reading(DomainValue::Real(1.0), 0).unwrap();
        assert_eq!(a.publish.unwrap().payload, "1");

        assert!(attr.on_reading(DomainValue::Real(2.0), 500).unwrap().is_empty());

        let c = attr.on_reading(DomainValue::Real(3.0), 1500).unwrap();
        assert_eq!(c.publish.unwrap().payload, "3");
        assert_eq!(attr.last_published_at_ms(), Some(1500));
    }

    #[test]
    fn test_interval_publishes_unchanged_value() {
        let mut attr = Attribute::new("temp", "s7/boiler/temp", DataKind::Real)
            .with_min_publish_interval_ms(100);
        assert!(attr.on_reading(DomainValue::Real(1.0), 0).unwrap().publish.is_some());
        assert!(attr.on_reading(DomainValue::Real(1.0), 100).unwrap().is_empty());
        assert!(attr.on_reading(DomainValue::Real(1.0), 101).unwrap().publish.is_some());
    }

    #[test]
    fn test_published_at_never_goes_backwards() {
        let mut attr = bit_attr();
        attr.on_reading(DomainValue::Bit(true), 1000).unwrap();
        attr.on_reading(DomainValue::Bit(false), 400).unwrap();
        assert_eq!(attr.last_published_at_ms(), Some(1000));
    }

    #[test]
    fn test_rounding_applies_before_dedup() {
        let mut attr = Attribute::new("temp", "s7/boiler/temp", DataKind::Real);
        let first = attr.on_reading(DomainValue::Real(21.12345), 0).unwrap();
        assert_eq!(first.publish.unwrap().payload, "21.123");
        assert!(attr.on_reading(DomainValue::Real(21.1231), 1).unwrap().is_empty());
    }

    #[test]
    fn test_rounding_disabled_keeps_raw() {
        let mut attr =
            Attribute::new("temp", "s7/boiler/temp", DataKind::Real).with_rounding(false);
        let outcome = attr.on_reading(DomainValue::Real(0.12345), 0).unwrap();
        assert_eq!(outcome.publish.unwrap().payload, "0.12345");
    }

    #[test]
    fn test_non_finite_real_is_not_rounded() {
        let mut attr = Attribute::new("temp", "s7/boiler/temp", DataKind::Real);
        let outcome = attr.on_reading(DomainValue::Real(f32::INFINITY), 0).unwrap();
        assert_eq!(outcome.publish.unwrap().payload, "inf");
    }

    #[test]
    fn test_inversion_applies_before_dedup() {
        let mut attr = bit_attr().with_inverted(true);
        let outcome = attr.on_reading(DomainValue::Bit(false), 0).unwrap();
        assert_eq!(outcome.publish.unwrap().payload, "true");
        assert_eq!(attr.last_published(), Some(DomainValue::Bit(true)));
        assert!(attr.on_reading(DomainValue::Bit(false), 1).unwrap().is_empty());
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let mut attr = bit_attr();
        let err = attr.on_reading(DomainValue::Byte(1), 0).unwrap_err();
        assert_eq!(
            err,
            CodecError::KindMismatch {
                expected: DataKind::Bit,
                found: DataKind::Byte
            }
        );
        assert!(attr.last_published().is_none());
    }

    #[test]
    fn test_write_only_attribute_ignores_readings() {
        let mut attr = bit_attr().with_direction(Direction::WriteOnly);
        assert!(attr.on_reading(DomainValue::Bit(true), 0).unwrap().is_empty());
        assert!(attr.last_published().is_none());
    }

    #[test]
    fn test_write_back_echo_suppression() {
        let mut attr = Attribute::new("level", "s7/tank/level", DataKind::Byte)
            .with_address(AddressDescriptor::parse("DB2.DBB0").unwrap())
            .with_write_back(true);

        let write = attr.on_write("5").unwrap();
        assert_eq!(write.value, DomainValue::Byte(5));
        assert_eq!(attr.last_written(), Some(DomainValue::Byte(5)));

        let echo = attr.on_reading(DomainValue::Byte(5), 0).unwrap();
        assert!(echo.publish.is_some());
        assert!(echo.write.is_none());
        assert_eq!(attr.last_written(), None);

        let changed = attr.on_reading(DomainValue::Byte(6), 1).unwrap();
        assert_eq!(
            changed.write,
            Some(WriteRequest {
                topic: "s7/tank/level".to_string(),
                value: DomainValue::Byte(6)
            })
        );
    }

    #[test]
    fn test_write_back_needs_writable_attribute() {
        let mut attr = Attribute::new("level", "s7/tank/level", DataKind::Byte)
            .with_write_back(true)
            .with_direction(Direction::ReadOnly);
        let outcome = attr.on_reading(DomainValue::Byte(6), 0).unwrap();
        assert!(outcome.publish.is_some());
        assert!(outcome.write.is_none());
    }

    #[test]
    fn test_write_rejected_when_read_only() {
        let mut attr = bit_attr().with_direction(Direction::ReadOnly);
        assert!(matches!(
            attr.on_write("true"),
            Err(DispatchError::WriteDisabled(_))
        ));
        assert!(attr.last_written().is_none());
    }

    #[test]
    fn test_malformed_write_leaves_state_unchanged() {
        let mut attr = bit_attr();
        attr.on_write("on").unwrap();
        let err = attr.on_write("maybe").unwrap_err();
        assert!(matches!(err, DispatchError::Codec(CodecError::Format(_))));
        assert_eq!(attr.last_written(), Some(DomainValue::Bit(true)));
    }

    #[test]
    fn test_write_address_prefers_set_address() {
        let attr = bit_attr();
        assert_eq!(attr.write_address(), attr.address());

        let attr = attr.with_set_address(AddressDescriptor::parse("DB1.DBX2.1").unwrap());
        assert_eq!(attr.write_address().unwrap().byte_offset, 2);
        assert_eq!(attr.address().unwrap().byte_offset, 0);
        assert_eq!(attr.set_topic(), "s7/lamp/state/set");
    }

    #[test]
    fn test_unrounded_real_write_is_not_consumed_as_echo() {
        let mut attr = Attribute::new("setpoint", "s7/boiler/setpoint", DataKind::Real)
            .with_address(AddressDescriptor::parse("DB2.DBR4").unwrap())
            .with_write_back(true);

        attr.on_write("3.14159").unwrap();
        assert_eq!(attr.last_written(), Some(DomainValue::Real(3.14159)));

        let outcome = attr.on_reading(DomainValue::Real(3.14159), 0).unwrap();
        assert_eq!(outcome.publish.unwrap().payload, "3.142");
        assert_eq!(outcome.write.unwrap().value, DomainValue::Real(3.142));
        assert_eq!(attr.last_written(), Some(DomainValue::Real(3.14159)));

        attr.on_write("3.142").unwrap();
        let outcome = attr.on_reading(DomainValue::Real(2.5), 10).unwrap();
        assert!(outcome.write.is_some());
        let outcome = attr.on_reading(DomainValue::Real(3.142), 20).unwrap();
        assert!(outcome.write.is_none());
        assert!(attr.last_written().is_none());
    }
}
