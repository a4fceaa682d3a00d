//! Array header: the fixed-shape block at the start of every array record.

use std::io::{Read, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::element::{ElementType, MAX_ELEMENT_TYPE_CODE};
use crate::error::{Result, TadError};

/// Magic bytes identifying a TAD record: `TAD` followed by format version 0.
pub const TAD_MAGIC: [u8; 4] = [b'T', b'A', b'D', TAD_VERSION];

/// Current format version, stored as the fourth magic byte.
pub const TAD_VERSION: u8 = 0;

/// Size of the header before the dimension extents, in bytes.
///
/// Layout: magic(4) + element_type(1) + component_count(8) + dimension_count(8) = 21
pub const HEADER_FIXED_SIZE: usize = 21;

/// Largest count or extent accepted from a header.
///
/// Values above this cannot describe an in-memory buffer on this platform
/// and are rejected instead of being narrowed.
pub const MAX_ADDRESSABLE: u64 = isize::MAX as u64;

/// The decoded header of one array record.
///
/// Layout (host byte order, no padding):
/// - `[0..4]`   magic: `TAD\0`
/// - `[4]`      element type code: u8
/// - `[5..13]`  component count: u64
/// - `[13..21]` dimension count: u64
/// - `[21..]`   one u64 extent per dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayHeader {
    /// Type of every component
    pub element_type: ElementType,
    /// Number of components per element
    pub component_count: u64,
    /// Extent of each dimension
    pub dimensions: Vec<u64>,
}

impl ArrayHeader {
    pub fn new(element_type: ElementType, component_count: u64, dimensions: Vec<u64>) -> Self {
        Self {
            element_type,
            component_count,
            dimensions,
        }
    }

    pub fn dimension_count(&self) -> u64 {
        self.dimensions.len() as u64
    }

    /// Check counts and extents against the format's range rules.
    ///
    /// # Errors
    ///
    /// Returns [`TadError::OutOfRange`] for a zero or oversized component
    /// count, dimension count or extent.
    pub fn validate(&self) -> Result<()> {
        check_range("component count", self.component_count)?;
        check_range("dimension count", self.dimension_count())?;
        for &extent in &self.dimensions {
            check_range("dimension extent", extent)?;
        }
        Ok(())
    }

    /// Number of elements, i.e. the product of all extents.
    pub fn element_count(&self) -> Result<u64> {
        self.dimensions
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or(TadError::OutOfRange {
                field: "element count",
                value: u64::MAX,
            })
    }

    /// Size of the payload that follows the tag lists, in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TadError::OutOfRange`] if the size overflows or exceeds
    /// [`MAX_ADDRESSABLE`].
    pub fn payload_size(&self) -> Result<u64> {
        let size = self
            .element_count()?
            .checked_mul(self.component_count)
            .and_then(|n| n.checked_mul(self.element_type.size() as u64))
            .ok_or(TadError::OutOfRange {
                field: "payload size",
                value: u64::MAX,
            })?;
        if size > MAX_ADDRESSABLE {
            return Err(TadError::OutOfRange {
                field: "payload size",
                value: size,
            });
        }
        Ok(size)
    }

    /// Length of the encoded header in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_FIXED_SIZE + self.dimensions.len() * 8
    }

    /// Write the header to `writer`.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&TAD_MAGIC)?;
        writer.write_u8(self.element_type.code())?;
        writer.write_u64::<NativeEndian>(self.component_count)?;
        writer.write_u64::<NativeEndian>(self.dimension_count())?;
        for &extent in &self.dimensions {
            writer.write_u64::<NativeEndian>(extent)?;
        }
        Ok(())
    }

    /// Read and validate a header from the current reader position.
    ///
    /// # Errors
    ///
    /// - [`TadError::Io`] on a short read.
    /// - [`TadError::InvalidMagic`], [`TadError::InvalidElementType`] or
    ///   [`TadError::OutOfRange`] for structurally invalid content.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; HEADER_FIXED_SIZE];
        reader.read_exact(&mut fixed)?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&fixed[0..4]);
        if magic != TAD_MAGIC {
            return Err(TadError::InvalidMagic(magic));
        }

        let type_code = fixed[4];
        if type_code > MAX_ELEMENT_TYPE_CODE {
            return Err(TadError::InvalidElementType(type_code));
        }
        // Codes up to 15 are reserved by the layout, but only the defined
        // ones have a known element size.
        let element_type =
            ElementType::from_code(type_code).ok_or(TadError::InvalidElementType(type_code))?;

        let mut counts = &fixed[5..];
        let component_count = counts.read_u64::<NativeEndian>()?;
        let dimension_count = counts.read_u64::<NativeEndian>()?;
        check_range("component count", component_count)?;
        check_range("dimension count", dimension_count)?;

        // Extents are read one by one so a corrupt dimension count fails on
        // the first short read instead of reserving a huge vector up front.
        let mut dimensions = Vec::with_capacity(dimension_count.min(16) as usize);
        for _ in 0..dimension_count {
            let extent = reader.read_u64::<NativeEndian>()?;
            check_range("dimension extent", extent)?;
            dimensions.push(extent);
        }

        let header = Self {
            element_type,
            component_count,
            dimensions,
        };
        header.payload_size()?;
        Ok(header)
    }
}

fn check_range(field: &'static str, value: u64) -> Result<()> {
    if value == 0 || value > MAX_ADDRESSABLE {
        return Err(TadError::OutOfRange { field, value });
    }
    Ok(())
}
