//! In-memory arrays: a raw element buffer plus its three groups of tag lists.
//!
//! An [`Array`] has one or more dimensions, each element consists of a fixed
//! number of components, and all components share one [`ElementType`]. For
//! example, an 800x600 RGB image is a two-dimensional array with extents
//! `[800, 600]` and three `uint8` components per element.
//!
//! Elements are stored with the first dimension varying fastest, components
//! of one element contiguous.

use byteorder::{ByteOrder, NativeEndian};

use crate::element::ElementType;
use crate::error::{Result, TadError};
use crate::header::ArrayHeader;
use crate::taglist::TagList;

/// A multidimensional array with metadata.
///
/// The payload length always equals
/// `product(dimensions) * component_count * element_type.size()`; the
/// constructors enforce it and the buffer cannot be resized afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array {
    header: ArrayHeader,
    global_tags: TagList,
    component_tags: Vec<TagList>,
    dimension_tags: Vec<TagList>,
    data: Vec<u8>,
}

impl Array {
    /// Create a zero-filled array.
    ///
    /// # Errors
    ///
    /// Returns [`TadError::OutOfRange`] if there are no dimensions, no
    /// components, a zero extent, or the payload would not fit in memory.
    pub fn new(
        dimensions: impl Into<Vec<u64>>,
        component_count: u64,
        element_type: ElementType,
    ) -> Result<Self> {
        let header = ArrayHeader::new(element_type, component_count, dimensions.into());
        let size = checked_payload_size(&header)?;
        Ok(Self::from_header(header, vec![0u8; size]))
    }

    /// Create an array around an existing payload.
    ///
    /// # Errors
    ///
    /// Returns [`TadError::PayloadSizeMismatch`] if `data` is shorter or
    /// longer than the shape requires.
    pub fn from_data(
        dimensions: impl Into<Vec<u64>>,
        component_count: u64,
        element_type: ElementType,
        data: Vec<u8>,
    ) -> Result<Self> {
        let header = ArrayHeader::new(element_type, component_count, dimensions.into());
        let size = checked_payload_size(&header)?;
        if data.len() != size {
            return Err(TadError::PayloadSizeMismatch {
                expected: size as u64,
                actual: data.len() as u64,
            });
        }
        Ok(Self::from_header(header, data))
    }

    /// Assemble an array from decoded record parts. The caller guarantees
    /// that the header was validated and the tag-list groups and payload
    /// have the sizes it describes.
    pub(crate) fn from_parts(
        header: ArrayHeader,
        global_tags: TagList,
        component_tags: Vec<TagList>,
        dimension_tags: Vec<TagList>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            header,
            global_tags,
            component_tags,
            dimension_tags,
            data,
        }
    }

    fn from_header(header: ArrayHeader, data: Vec<u8>) -> Self {
        let components = header.component_count as usize;
        let dims = header.dimensions.len();
        Self {
            header,
            global_tags: TagList::new(),
            component_tags: vec![TagList::new(); components],
            dimension_tags: vec![TagList::new(); dims],
            data,
        }
    }

    // ---------------------------------------------------------------
    // Shape
    // ---------------------------------------------------------------

    /// The header describing this array's shape and type.
    pub fn header(&self) -> &ArrayHeader {
        &self.header
    }

    pub fn element_type(&self) -> ElementType {
        self.header.element_type
    }

    pub fn component_count(&self) -> u64 {
        self.header.component_count
    }

    pub fn dimension_count(&self) -> usize {
        self.header.dimensions.len()
    }

    pub fn dimensions(&self) -> &[u64] {
        &self.header.dimensions
    }

    /// Extent of dimension `d`.
    ///
    /// # Panics
    ///
    /// Panics if `d >= self.dimension_count()`.
    pub fn dimension(&self, d: usize) -> u64 {
        self.header.dimensions[d]
    }

    /// Number of elements (product of all extents).
    pub fn element_count(&self) -> u64 {
        self.header.dimensions.iter().product()
    }

    /// Size of one element (all its components) in bytes.
    pub fn element_size(&self) -> u64 {
        self.header.component_count * self.header.element_type.size() as u64
    }

    /// Total payload size in bytes.
    pub fn data_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether `other` has the same type, component count and element count.
    pub fn is_compatible(&self, other: &Array) -> bool {
        self.element_type() == other.element_type()
            && self.component_count() == other.component_count()
            && self.element_count() == other.element_count()
    }

    // ---------------------------------------------------------------
    // Indexing
    // ---------------------------------------------------------------

    /// Convert a multidimensional element index into a linear one.
    ///
    /// For an 800x600 array, `[1, 1]` maps to 801.
    ///
    /// Returns `None` if the index has the wrong length or is out of bounds.
    pub fn to_linear_index(&self, index: &[u64]) -> Option<u64> {
        if index.len() != self.dimension_count() {
            return None;
        }
        let mut linear = 0u64;
        let mut stride = 1u64;
        for (&i, &extent) in index.iter().zip(self.dimensions()) {
            if i >= extent {
                return None;
            }
            linear += i * stride;
            stride *= extent;
        }
        Some(linear)
    }

    /// Convert a linear element index into a multidimensional one.
    ///
    /// Returns `None` if `linear` is out of bounds.
    pub fn to_vector_index(&self, linear: u64) -> Option<Vec<u64>> {
        if linear >= self.element_count() {
            return None;
        }
        let mut rest = linear;
        let index = self
            .dimensions()
            .iter()
            .map(|&extent| {
                let i = rest % extent;
                rest /= extent;
                i
            })
            .collect();
        Some(index)
    }

    /// Byte offset of element `linear` within the payload.
    pub fn element_offset(&self, linear: u64) -> Option<usize> {
        (linear < self.element_count()).then(|| (linear * self.element_size()) as usize)
    }

    /// Byte offset of component `component` of element `linear`.
    pub fn component_offset(&self, linear: u64, component: u64) -> Option<usize> {
        if component >= self.component_count() {
            return None;
        }
        let within = (component * self.element_type().size() as u64) as usize;
        self.element_offset(linear).map(|offset| offset + within)
    }

    /// Raw bytes of element `linear` (all components).
    pub fn element(&self, linear: u64) -> Option<&[u8]> {
        let start = self.element_offset(linear)?;
        Some(&self.data[start..start + self.element_size() as usize])
    }

    /// Value of one component converted to `f64`.
    ///
    /// 64-bit integers beyond 2^53 lose precision.
    pub fn component_value(&self, linear: u64, component: u64) -> Option<f64> {
        let start = self.component_offset(linear, component)?;
        let bytes = &self.data[start..start + self.element_type().size()];
        let value = match self.element_type() {
            ElementType::Int8 => f64::from(bytes[0] as i8),
            ElementType::Uint8 => f64::from(bytes[0]),
            ElementType::Int16 => f64::from(NativeEndian::read_i16(bytes)),
            ElementType::Uint16 => f64::from(NativeEndian::read_u16(bytes)),
            ElementType::Int32 => f64::from(NativeEndian::read_i32(bytes)),
            ElementType::Uint32 => f64::from(NativeEndian::read_u32(bytes)),
            ElementType::Int64 => NativeEndian::read_i64(bytes) as f64,
            ElementType::Uint64 => NativeEndian::read_u64(bytes) as f64,
            ElementType::Float32 => f64::from(NativeEndian::read_f32(bytes)),
            ElementType::Float64 => NativeEndian::read_f64(bytes),
        };
        Some(value)
    }

    // ---------------------------------------------------------------
    // Data
    // ---------------------------------------------------------------

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    // ---------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------

    pub fn global_tags(&self) -> &TagList {
        &self.global_tags
    }

    pub fn global_tags_mut(&mut self) -> &mut TagList {
        &mut self.global_tags
    }

    /// Tag list of component `c`.
    ///
    /// # Panics
    ///
    /// Panics if `c` is not a valid component index.
    pub fn component_tags(&self, c: usize) -> &TagList {
        &self.component_tags[c]
    }

    pub fn component_tags_mut(&mut self, c: usize) -> &mut TagList {
        &mut self.component_tags[c]
    }

    /// Tag list of dimension `d`.
    ///
    /// # Panics
    ///
    /// Panics if `d` is not a valid dimension index.
    pub fn dimension_tags(&self, d: usize) -> &TagList {
        &self.dimension_tags[d]
    }

    pub fn dimension_tags_mut(&mut self, d: usize) -> &mut TagList {
        &mut self.dimension_tags[d]
    }

    /// All component tag lists, in component order.
    pub fn all_component_tags(&self) -> &[TagList] {
        &self.component_tags
    }

    /// All dimension tag lists, in dimension order.
    pub fn all_dimension_tags(&self) -> &[TagList] {
        &self.dimension_tags
    }
}

impl From<&Array> for ArrayHeader {
    fn from(array: &Array) -> Self {
        array.header.clone()
    }
}

/// Validate the header and return its payload size as an in-memory length.
fn checked_payload_size(header: &ArrayHeader) -> Result<usize> {
    header.validate()?;
    let size = header.payload_size()?;
    usize::try_from(size).map_err(|_| TadError::OutOfRange {
        field: "payload size",
        value: size,
    })
}
