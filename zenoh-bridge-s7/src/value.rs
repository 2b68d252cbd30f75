//! Register data kinds and typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Type of a register value inside a data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// Single bit (`X`).
    Bit,
    /// Unsigned 8-bit (`B`).
    Byte,
    /// Signed 16-bit, big-endian (`W`, also `I`).
    Word,
    /// Unsigned 32-bit, big-endian (`D`).
    Dword,
    /// IEEE-754 single precision, big-endian (`R`).
    Real,
}

impl DataKind {
    /// Canonical short code used in addresses.
    pub fn code(self) -> char {
        match self {
            DataKind::Bit => 'X',
            DataKind::Byte => 'B',
            DataKind::Word => 'W',
            DataKind::Dword => 'D',
            DataKind::Real => 'R',
        }
    }

    /// Number of bytes read from the data block for this kind.
    pub fn width(self) -> usize {
        match self {
            DataKind::Bit | DataKind::Byte => 1,
            DataKind::Word => 2,
            DataKind::Dword | DataKind::Real => 4,
        }
    }

    /// Resolve a short code or long alias (`X`, `DBW`, `INT`, `REAL`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code.to_ascii_uppercase().as_str() {
            "X" | "BOOL" | "DBX" => DataKind::Bit,
            "B" | "BYTE" | "DBB" => DataKind::Byte,
            "W" | "I" | "WORD" | "INT" | "DBW" | "DBI" | "DI" => DataKind::Word,
            "D" | "DWORD" | "DBD" | "DW" => DataKind::Dword,
            "R" | "REAL" | "DBR" | "DR" => DataKind::Real,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for DataKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataKind::from_code(s.trim()).ok_or_else(|| CodecError::UnsupportedKind(s.to_string()))
    }
}

/// A typed register value. The variant always matches the owning attribute's [`DataKind`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DomainValue {
    Bit(bool),
    Byte(u8),
    Word(i16),
    Dword(u32),
    Real(f32),
}

impl DomainValue {
    pub fn kind(&self) -> DataKind {
        match self {
            DomainValue::Bit(_) => DataKind::Bit,
            DomainValue::Byte(_) => DataKind::Byte,
            DomainValue::Word(_) => DataKind::Word,
            DomainValue::Dword(_) => DataKind::Dword,
            DomainValue::Real(_) => DataKind::Real,
        }
    }
}

/// Published text form: `true`/`false`, plain integers, shortest round-trip float.
impl fmt::Display for DomainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainValue::Bit(v) => write!(f, "{}", v),
            DomainValue::Byte(v) => write!(f, "{}", v),
            DomainValue::Word(v) => write!(f, "{}", v),
            DomainValue::Dword(v) => write!(f, "{}", v),
            DomainValue::Real(v) => write!(f, "{}", v),
        }
    }
}
