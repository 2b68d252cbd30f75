//! Error types for the S7 bridge core.

use thiserror::Error;

use crate::value::DataKind;

/// Address text could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The text does not match `DB<n>.<KIND><byte>[.<bit>]`.
    #[error("Unsupported address format: {0}")]
    Parse(String),
    /// Bit offset given for a non-bit kind, or outside 0..=7.
    #[error("Address out of range: {address}: {reason}")]
    Range { address: String, reason: String },
}

/// Conversion between bytes, text and typed values failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Text could not be converted, or the value is out of range for the kind.
    #[error("{0}")]
    Format(String),
    /// No codec exists for the named kind.
    #[error("Unsupported data kind: {0}")]
    UnsupportedKind(String),
    /// The value's tag differs from the kind it was used as.
    #[error("Expected a {expected} value, got {found}")]
    KindMismatch { expected: DataKind, found: DataKind },
    /// Fewer bytes than the kind needs.
    #[error("{kind} needs {needed} byte(s), got {got}")]
    ShortBuffer {
        kind: DataKind,
        needed: usize,
        got: usize,
    },
}

/// A controller or messaging collaborator failed.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Failed to read {item}: {message}")]
    Read { item: String, message: String },
    #[error("Failed to write {item}: {message}")]
    Write { item: String, message: String },
    #[error("Failed to publish {topic}: {message}")]
    Publish { topic: String, message: String },
    #[error("Failed to subscribe to {pattern}: {message}")]
    Subscribe { pattern: String, message: String },
    #[error("No address registered for {0}")]
    UnknownItem(String),
}

/// Routing a reading or a write to an attribute failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Topic {0} is not a device attribute topic")]
    UnknownTopic(String),
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
    #[error("Device {device} has no attribute {attribute}")]
    UnknownAttribute { device: String, attribute: String },
    #[error("Attribute {0} does not accept writes")]
    WriteDisabled(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// A configured attribute could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeBuildError {
    #[error("no plc or set_plc address configured")]
    NoAddress,
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Kind(#[from] CodecError),
    #[error("address kind {found} does not match required kind {expected}")]
    KindMismatch { expected: DataKind, found: DataKind },
}
