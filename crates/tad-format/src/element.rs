//! Element types: the numeric type shared by all components of an array.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest element type code the header can carry.
pub const MAX_ELEMENT_TYPE_CODE: u8 = 15;

/// The data type that array element components can represent.
///
/// The discriminant is the 1-byte code stored in every array header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ElementType {
    Int8 = 0,
    Uint8 = 1,
    Int16 = 2,
    Uint16 = 3,
    Int32 = 4,
    Uint32 = 5,
    Int64 = 6,
    Uint64 = 7,
    /// IEEE 754 single precision
    Float32 = 8,
    /// IEEE 754 double precision
    Float64 = 9,
}

impl ElementType {
    /// All defined element types, in code order.
    pub const ALL: [ElementType; 10] = [
        ElementType::Int8,
        ElementType::Uint8,
        ElementType::Int16,
        ElementType::Uint16,
        ElementType::Int32,
        ElementType::Uint32,
        ElementType::Int64,
        ElementType::Uint64,
        ElementType::Float32,
        ElementType::Float64,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Size in bytes of a single component of this type.
    pub fn size(self) -> usize {
        match self {
            ElementType::Int8 | ElementType::Uint8 => 1,
            ElementType::Int16 | ElementType::Uint16 => 2,
            ElementType::Int32 | ElementType::Uint32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::Uint64 | ElementType::Float64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::Uint8 => "uint8",
            ElementType::Int16 => "int16",
            ElementType::Uint16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::Uint32 => "uint32",
            ElementType::Int64 => "int64",
            ElementType::Uint64 => "uint64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name an element type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown element type '{0}'")]
pub struct UnknownElementType(pub String);

impl FromStr for ElementType {
    type Err = UnknownElementType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownElementType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_positions() {
        for (i, t) in ElementType::ALL.iter().enumerate() {
            assert_eq!(t.code() as usize, i);
            assert_eq!(ElementType::from_code(i as u8), Some(*t));
        }
    }

    #[test]
    fn test_reserved_codes_are_unknown() {
        for code in 10..=MAX_ELEMENT_TYPE_CODE {
            assert_eq!(ElementType::from_code(code), None);
        }
        assert_eq!(ElementType::from_code(255), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(ElementType::Uint8.size(), 1);
        assert_eq!(ElementType::Int16.size(), 2);
        assert_eq!(ElementType::Float32.size(), 4);
        assert_eq!(ElementType::Float64.size(), 8);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("float32".parse::<ElementType>(), Ok(ElementType::Float32));
        assert_eq!("uint16".parse::<ElementType>(), Ok(ElementType::Uint16));
        assert!("float16".parse::<ElementType>().is_err());
        assert_eq!(ElementType::Int64.to_string(), "int64");
    }

    #[test]
    fn test_unknown_name_error() {
        let err = "complex64".parse::<ElementType>().unwrap_err();
        assert_eq!(err, UnknownElementType("complex64".to_string()));
        assert_eq!(err.to_string(), "unknown element type 'complex64'");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }
}
