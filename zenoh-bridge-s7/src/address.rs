//! Data block address resolution.
//!
//! Addresses look like `DB<n>.<KIND><byte>[.<bit>]`, e.g. `DB1.DBX0.3`,
//! `DB10.DBW4`, `db2.real8`. Long aliases normalize to the short codes
//! `X`, `B`, `W`, `D`, `R`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AddressError;
use crate::value::DataKind;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^DB(\d+)\.(DBX|DBB|DBW|DBD|DBI|DBR|BOOL|BYTE|WORD|INT|DWORD|REAL|DW|DI|DR|X|B|W|I|D|R)(\d+)(?:\.(\d+))?$",
    )
    .expect("address pattern is valid")
});

/// Location and type of one value inside a data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressDescriptor {
    pub block: u32,
    pub kind: DataKind,
    pub byte_offset: u32,
    /// Always 0 unless `kind` is [`DataKind::Bit`].
    pub bit_offset: u8,
}

impl AddressDescriptor {
    /// Resolve address text into a descriptor.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let normalized = address.trim().to_ascii_uppercase();
        let caps = ADDRESS_RE
            .captures(&normalized)
            .ok_or_else(|| AddressError::Parse(address.to_string()))?;

        let number = |idx: usize| -> Result<u32, AddressError> {
            caps[idx]
                .parse::<u32>()
                .map_err(|_| AddressError::Parse(address.to_string()))
        };

        let block = number(1)?;
        let kind = DataKind::from_code(&caps[2]).ok_or_else(|| AddressError::Parse(address.to_string()))?;
        let byte_offset = number(3)?;

        let bit_offset = match (kind, caps.get(4)) {
            (DataKind::Bit, None) => 0,
            (DataKind::Bit, Some(bit)) => match bit.as_str().parse::<u8>() {
                Ok(bit) if bit <= 7 => bit,
                _ => {
                    return Err(AddressError::Range {
                        address: address.to_string(),
                        reason: format!("bit offset {} outside 0-7", bit.as_str()),
                    });
                }
            },
            (_, None) => 0,
            (kind, Some(bit)) => {
                return Err(AddressError::Range {
                    address: address.to_string(),
                    reason: format!("bit offset {} not allowed for {}", bit.as_str(), kind),
                });
            }
        };

        Ok(Self {
            block,
            kind,
            byte_offset,
            bit_offset,
        })
    }
}

impl FromStr for AddressDescriptor {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical form, e.g. `DB1.X0.3` or `DB10.W4`.
impl fmt::Display for AddressDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DB{}.{}{}", self.block, self.kind.code(), self.byte_offset)?;
        if self.kind == DataKind::Bit {
            write!(f, ".{}", self.bit_offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bit_address() {
        let addr = AddressDescriptor::parse("DB1.DBX0.0").unwrap();
        assert_eq!(
            addr,
            AddressDescriptor {
                block: 1,
                kind: DataKind::Bit,
                byte_offset: 0,
                bit_offset: 0,
            }
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let addr = AddressDescriptor::parse("db12.dbw34").unwrap();
        assert_eq!(addr.block, 12);
        assert_eq!(addr.kind, DataKind::Word);
        assert_eq!(addr.byte_offset, 34);
        assert_eq!(addr.bit_offset, 0);
    }

    #[test]
    fn test_long_aliases() {
        assert_eq!(AddressDescriptor::parse("DB1.REAL8").unwrap().kind, DataKind::Real);
        assert_eq!(AddressDescriptor::parse("DB1.DWORD8").unwrap().kind, DataKind::Dword);
        assert_eq!(AddressDescriptor::parse("DB1.DW8").unwrap().kind, DataKind::Dword);
        assert_eq!(AddressDescriptor::parse("DB1.DBD8").unwrap().kind, DataKind::Dword);
        assert_eq!(AddressDescriptor::parse("DB1.DI2").unwrap().kind, DataKind::Word);
        assert_eq!(AddressDescriptor::parse("DB1.INT2").unwrap().kind, DataKind::Word);
        assert_eq!(AddressDescriptor::parse("DB1.DR4").unwrap().kind, DataKind::Real);
        assert_eq!(AddressDescriptor::parse("DB1.BYTE3").unwrap().kind, DataKind::Byte);
        assert_eq!(AddressDescriptor::parse("DB1.BOOL3.7").unwrap().kind, DataKind::Bit);
    }

    #[test]
    fn test_bit_defaults_to_zero() {
        let addr = AddressDescriptor::parse("DB3.X5").unwrap();
        assert_eq!(addr.kind, DataKind::Bit);
        assert_eq!(addr.byte_offset, 5);
        assert_eq!(addr.bit_offset, 0);
    }

    #[test]
    fn test_malformed_addresses() {
        for text in ["", "DB1", "DB1,X0.0", "M0.0", "DB1.Q0", "DBx.X0", "DB1.X0.", "DB1.X0.1.2"] {
            assert!(
                matches!(AddressDescriptor::parse(text), Err(AddressError::Parse(_))),
                "{text} should not parse"
            );
        }
    }

    #[test]
    fn test_bit_offset_on_non_bit_kind() {
        let err = AddressDescriptor::parse("DB1.DBW2.0").unwrap_err();
        assert!(matches!(err, AddressError::Range { .. }));
    }

    #[test]
    fn test_bit_offset_out_of_range() {
        let err = AddressDescriptor::parse("DB1.DBX0.8").unwrap_err();
        assert!(matches!(err, AddressError::Range { .. }));
        let err = AddressDescriptor::parse("DB1.DBX0.300").unwrap_err();
        assert!(matches!(err, AddressError::Range { .. }));
    }

    #[test]
    fn test_canonical_round_trip() {
        for text in ["DB1.DBX0.0", "DB7.X3.7", "DB2.DBB9", "DB100.INT40", "DB4.DBD0", "DB4.DR12"] {
            let addr = AddressDescriptor::parse(text).unwrap();
            let rendered = addr.to_string();
            assert_eq!(AddressDescriptor::parse(&rendered).unwrap(), addr, "{text} -> {rendered}");
        }
        assert_eq!(AddressDescriptor::parse("db1.dbx0.3").unwrap().to_string(), "DB1.X0.3");
        assert_eq!(AddressDescriptor::parse("DB100.INT40").unwrap().to_string(), "DB100.W40");
    }
}
