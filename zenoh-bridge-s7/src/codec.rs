//! Conversions between data block bytes, payload text and [`DomainValue`]s.
//!
//! Multi-byte kinds are big-endian, matching S7 memory layout. Bits are
//! read from and written into a single byte at the address' bit offset.

use crate::address::AddressDescriptor;
use crate::error::CodecError;
use crate::value::{DataKind, DomainValue};

const TRUTHY: [&str; 5] = ["true", "1", "on", "yes", "y"];
const FALSY: [&str; 5] = ["false", "0", "off", "no", "n"];

/// Decode the bytes read at `address` into a typed value.
pub fn decode_wire(raw: &[u8], address: &AddressDescriptor) -> Result<DomainValue, CodecError> {
    let kind = address.kind;
    let needed = kind.width();
    if raw.len() < needed {
        return Err(CodecError::ShortBuffer {
            kind,
            needed,
            got: raw.len(),
        });
    }

    let value = match kind {
        DataKind::Bit => DomainValue::Bit(raw[0] & bit_mask(address.bit_offset) != 0),
        DataKind::Byte => DomainValue::Byte(raw[0]),
        DataKind::Word => DomainValue::Word(i16::from_be_bytes([raw[0], raw[1]])),
        DataKind::Dword => DomainValue::Dword(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])),
        DataKind::Real => DomainValue::Real(f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])),
    };
    Ok(value)
}

/// Encode `value` for writing at `address`.
///
/// For bits, `existing` is the byte currently stored at the address (0 when
/// unknown); only the addressed bit changes.
pub fn encode_wire(
    value: &DomainValue,
    address: &AddressDescriptor,
    existing: Option<u8>,
) -> Result<Vec<u8>, CodecError> {
    if value.kind() != address.kind {
        return Err(CodecError::KindMismatch {
            expected: address.kind,
            found: value.kind(),
        });
    }

    let bytes = match *value {
        DomainValue::Bit(on) => {
            let current = existing.unwrap_or(0);
            let mask = bit_mask(address.bit_offset);
            vec![if on { current | mask } else { current & !mask }]
        }
        DomainValue::Byte(v) => vec![v],
        DomainValue::Word(v) => v.to_be_bytes().to_vec(),
        DomainValue::Dword(v) => v.to_be_bytes().to_vec(),
        DomainValue::Real(v) => v.to_be_bytes().to_vec(),
    };
    Ok(bytes)
}

/// Parse payload text as a value of `kind`.
pub fn decode_text(text: &str, kind: DataKind) -> Result<DomainValue, CodecError> {
    let text = text.trim();
    match kind {
        DataKind::Bit => {
            let lowered = text.to_ascii_lowercase();
            if TRUTHY.contains(&lowered.as_str()) {
                Ok(DomainValue::Bit(true))
            } else if FALSY.contains(&lowered.as_str()) {
                Ok(DomainValue::Bit(false))
            } else {
                Err(CodecError::Format("invalid value".to_string()))
            }
        }
        DataKind::Byte => {
            let n = parse_integer(text)?;
            u8::try_from(n)
                .map(DomainValue::Byte)
                .map_err(|_| out_of_range(n, kind, "0..255"))
        }
        DataKind::Word => {
            let n = parse_integer(text)?;
            i16::try_from(n)
                .map(DomainValue::Word)
                .map_err(|_| out_of_range(n, kind, "-32768..32767"))
        }
        DataKind::Dword => {
            let n = parse_integer(text)?;
            u32::try_from(n)
                .map(DomainValue::Dword)
                .map_err(|_| out_of_range(n, kind, "0..4294967295"))
        }
        DataKind::Real => {
            let v: f32 = text
                .replace(',', ".")
                .parse()
                .map_err(|_| CodecError::Format(format!("invalid number: {}", text)))?;
            if v.is_finite() {
                Ok(DomainValue::Real(v))
            } else {
                Err(CodecError::Format(format!("not a finite number: {}", text)))
            }
        }
    }
}

/// Decimal or `0x` hexadecimal, with an optional sign.
fn parse_integer(text: &str) -> Result<i64, CodecError> {
    let invalid = || CodecError::Format(format!("invalid integer: {}", text));

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, unsigned),
    };

    // from_str_radix alone would accept a second sign.
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn out_of_range(n: i64, kind: DataKind, range: &str) -> CodecError {
    CodecError::Format(format!("value {} out of range for {} ({})", n, kind, range))
}

fn bit_mask(bit_offset: u8) -> u8 {
    1u8 << (bit_offset & 0x07)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> AddressDescriptor {
        AddressDescriptor::parse(text).unwrap()
    }

    #[test]
    fn test_bit_read_modify_write() {
        let bit0 = addr("DB1.DBX0.0");
        let bytes = encode_wire(&DomainValue::Bit(true), &bit0, Some(0b0000_0100)).unwrap();
        assert_eq!(bytes, vec![0b0000_0101]);
        assert_eq!(decode_wire(&bytes, &bit0).unwrap(), DomainValue::Bit(true));

        let bit2 = addr("DB1.DBX0.2");
        let cleared = encode_wire(&DomainValue::Bit(false), &bit2, Some(0b1111_1111)).unwrap();
        assert_eq!(cleared, vec![0b1111_1011]);
    }

    #[test]
    fn test_bit_without_existing_byte() {
        let bytes = encode_wire(&DomainValue::Bit(true), &addr("DB1.X0.7"), None).unwrap();
        assert_eq!(bytes, vec![0b1000_0000]);
    }

    #[test]
    fn test_wire_round_trip() {
        let cases = [
            ("DB1.DBB1", DomainValue::Byte(200)),
            ("DB1.DBW2", DomainValue::Word(-1234)),
            ("DB1.DBW2", DomainValue::Word(i16::MAX)),
            ("DB1.DBD4", DomainValue::Dword(u32::MAX)),
            ("DB1.DBR8", DomainValue::Real(-273.15)),
        ];
        for (text, value) in cases {
            let address = addr(text);
            let bytes = encode_wire(&value, &address, None).unwrap();
            assert_eq!(bytes.len(), address.kind.width());
            assert_eq!(decode_wire(&bytes, &address).unwrap(), value, "{text}");
        }
    }

    #[test]
    fn test_big_endian_layout() {
        assert_eq!(
            encode_wire(&DomainValue::Word(123), &addr("DB1.DBW2"), None).unwrap(),
            vec![0x00, 0x7B]
        );
        assert_eq!(
            decode_wire(&[0xFF, 0xFE], &addr("DB1.DBW2")).unwrap(),
            DomainValue::Word(-2)
        );
        assert_eq!(
            decode_wire(&[0xFF, 0xFF, 0xFF, 0xFE], &addr("DB1.DBD0")).unwrap(),
            DomainValue::Dword(4_294_967_294)
        );
        assert_eq!(
            encode_wire(&DomainValue::Real(3.14), &addr("DB1.DBR4"), None).unwrap(),
            3.14f32.to_be_bytes().to_vec()
        );
    }

    #[test]
    fn test_short_buffer() {
        let err = decode_wire(&[0x01], &addr("DB1.DBD0")).unwrap_err();
        assert_eq!(
            err,
            CodecError::ShortBuffer {
                kind: DataKind::Dword,
                needed: 4,
                got: 1
            }
        );
    }

    #[test]
    fn test_encode_rejects_kind_mismatch() {
        let err = encode_wire(&DomainValue::Byte(1), &addr("DB1.DBW0"), None).unwrap_err();
        assert!(matches!(err, CodecError::KindMismatch { .. }));
    }

    #[test]
    fn test_boolean_text() {
        for text in ["true", "TRUE", "1", "on", "On", "yes", "Y"] {
            assert_eq!(decode_text(text, DataKind::Bit).unwrap(), DomainValue::Bit(true), "{text}");
        }
        for text in ["false", "False", "0", "OFF", "no", "n"] {
            assert_eq!(decode_text(text, DataKind::Bit).unwrap(), DomainValue::Bit(false), "{text}");
        }
        for text in ["2", "maybe", "", "truee"] {
            assert_eq!(
                decode_text(text, DataKind::Bit).unwrap_err(),
                CodecError::Format("invalid value".to_string())
            );
        }
    }

    #[test]
    fn test_integer_text() {
        assert_eq!(decode_text("0xFF", DataKind::Byte).unwrap(), DomainValue::Byte(255));
        assert_eq!(decode_text("10", DataKind::Byte).unwrap(), DomainValue::Byte(10));
        assert!(matches!(decode_text("300", DataKind::Byte), Err(CodecError::Format(_))));
        assert!(matches!(decode_text("-1", DataKind::Byte), Err(CodecError::Format(_))));

        assert_eq!(decode_text("-32768", DataKind::Word).unwrap(), DomainValue::Word(i16::MIN));
        assert_eq!(decode_text("0x7fff", DataKind::Word).unwrap(), DomainValue::Word(i16::MAX));
        assert!(decode_text("32768", DataKind::Word).is_err());

        assert_eq!(
            decode_text("4294967295", DataKind::Dword).unwrap(),
            DomainValue::Dword(u32::MAX)
        );
        assert!(decode_text("4294967296", DataKind::Dword).is_err());

        for text in ["", "abc", "0x", "1.5", "--1", "0xZZ", "12 apples"] {
            assert!(decode_text(text, DataKind::Word).is_err(), "{text}");
        }
    }

    #[test]
    fn test_real_text_accepts_comma() {
        assert_eq!(decode_text("3,14", DataKind::Real).unwrap(), DomainValue::Real(3.14));
        assert_eq!(decode_text("3.14", DataKind::Real).unwrap(), DomainValue::Real(3.14));
        assert_eq!(decode_text(" -0.5\n", DataKind::Real).unwrap(), DomainValue::Real(-0.5));
        assert!(decode_text("foo", DataKind::Real).is_err());
        assert!(decode_text("inf", DataKind::Real).is_err());
    }

    #[test]
    fn test_published_text_decodes_back() {
        for value in [
            DomainValue::Bit(false),
            DomainValue::Byte(7),
            DomainValue::Word(-9),
            DomainValue::Dword(70_000),
            DomainValue::Real(0.1),
        ] {
            assert_eq!(decode_text(&value.to_string(), value.kind()).unwrap(), value);
        }
    }
}
