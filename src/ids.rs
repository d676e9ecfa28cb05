//! Identifier widths and value-type codes (`spec.md` §4.2).
//!
//! Identifiers are read as big-endian unsigned integers of `idSize` bytes
//! and widened to `u64` everywhere they cross a visitor-facing API,
//! regardless of their declared on-disk width.

use crate::errors::{HprofError, Result};

/// The dump-declared width of an identifier, fixed once per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSize {
    One,
    Two,
    Four,
    Eight,
}

impl IdSize {
    pub fn bytes(self) -> u32 {
        match self {
            IdSize::One => 1,
            IdSize::Two => 2,
            IdSize::Four => 4,
            IdSize::Eight => 8,
        }
    }
}

impl TryFrom<u32> for IdSize {
    type Error = HprofError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(IdSize::One),
            2 => Ok(IdSize::Two),
            4 => Ok(IdSize::Four),
            8 => Ok(IdSize::Eight),
            other => Err(HprofError::UnsupportedIdSize(other)),
        }
    }
}

/// Element/field type codes used in constant pools, static and instance
/// fields, and primitive array dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    ArrayObject,
    NormalObject,
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl TryFrom<u8> for ValueType {
    type Error = HprofError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(ValueType::ArrayObject),
            2 => Ok(ValueType::NormalObject),
            4 => Ok(ValueType::Boolean),
            5 => Ok(ValueType::Char),
            6 => Ok(ValueType::Float),
            7 => Ok(ValueType::Double),
            8 => Ok(ValueType::Byte),
            9 => Ok(ValueType::Short),
            10 => Ok(ValueType::Int),
            11 => Ok(ValueType::Long),
            other => Err(HprofError::UnsupportedType(other)),
        }
    }
}

impl ValueType {
    /// JNI-style one-letter code used to build synthetic primitive array
    /// names (`"[I"`, `"[Z"`, ...). Only meaningful for primitive types.
    pub fn jni_code(self) -> Option<char> {
        match self {
            ValueType::Boolean => Some('Z'),
            ValueType::Char => Some('C'),
            ValueType::Float => Some('F'),
            ValueType::Double => Some('D'),
            ValueType::Byte => Some('B'),
            ValueType::Short => Some('S'),
            ValueType::Int => Some('I'),
            ValueType::Long => Some('J'),
            ValueType::ArrayObject | ValueType::NormalObject => None,
        }
    }

    pub fn from_jni_code(code: char) -> Option<Self> {
        match code {
            'Z' => Some(ValueType::Boolean),
            'C' => Some(ValueType::Char),
            'F' => Some(ValueType::Float),
            'D' => Some(ValueType::Double),
            'B' => Some(ValueType::Byte),
            'S' => Some(ValueType::Short),
            'I' => Some(ValueType::Int),
            'J' => Some(ValueType::Long),
            _ => None,
        }
    }
}

/// Bytes occupied on the wire by one value of type `t`, given `id_size`.
pub fn value_size(t: ValueType, id_size: IdSize) -> u32 {
    match t {
        ValueType::ArrayObject | ValueType::NormalObject => id_size.bytes(),
        ValueType::Boolean | ValueType::Byte => 1,
        ValueType::Char | ValueType::Short => 2,
        ValueType::Float | ValueType::Int => 4,
        ValueType::Double | ValueType::Long => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_size_rejects_unsupported_widths() {
        assert!(matches!(IdSize::try_from(3), Err(HprofError::UnsupportedIdSize(3))));
        assert!(matches!(IdSize::try_from(16), Err(HprofError::UnsupportedIdSize(16))));
    }

    #[test]
    fn id_size_accepts_all_four_widths() {
        assert_eq!(IdSize::try_from(1).unwrap().bytes(), 1);
        assert_eq!(IdSize::try_from(2).unwrap().bytes(), 2);
        assert_eq!(IdSize::try_from(4).unwrap().bytes(), 4);
        assert_eq!(IdSize::try_from(8).unwrap().bytes(), 8);
    }

    #[test]
    fn value_size_matches_spec_table() {
        let id8 = IdSize::Eight;
        assert_eq!(value_size(ValueType::Boolean, id8), 1);
        assert_eq!(value_size(ValueType::Byte, id8), 1);
        assert_eq!(value_size(ValueType::Char, id8), 2);
        assert_eq!(value_size(ValueType::Short, id8), 2);
        assert_eq!(value_size(ValueType::Float, id8), 4);
        assert_eq!(value_size(ValueType::Int, id8), 4);
        assert_eq!(value_size(ValueType::Double, id8), 8);
        assert_eq!(value_size(ValueType::Long, id8), 8);
        assert_eq!(value_size(ValueType::NormalObject, id8), 8);
        assert_eq!(value_size(ValueType::NormalObject, IdSize::Four), 4);
    }

    #[test]
    fn unsupported_type_code_fails() {
        assert!(matches!(ValueType::try_from(0x03), Err(HprofError::UnsupportedType(0x03))));
    }

    #[test]
    fn jni_codes_round_trip() {
        for t in [
            ValueType::Boolean,
            ValueType::Char,
            ValueType::Float,
            ValueType::Double,
            ValueType::Byte,
            ValueType::Short,
            ValueType::Int,
            ValueType::Long,
        ] {
            let code = t.jni_code().unwrap();
            assert_eq!(ValueType::from_jni_code(code), Some(t));
        }
    }
}
