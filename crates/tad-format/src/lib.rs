//! # tad-format
//!
//! The TAD (Tagged Array Data) container library. Reads and writes `.tad`
//! files holding any number of multidimensional arrays, each annotated with
//! key/value tag lists.
//!
//! ## Format Overview
//!
//! A `.tad` file is a sequence of self-contained array records. Each record
//! consists of:
//! - **Header**: magic `TAD\0`, element type, component count, dimension
//!   count and one extent per dimension
//! - **Tag lists**: one global list, one per component, one per dimension
//! - **Payload**: raw element data, first dimension varying fastest
//!
//! All integers are fixed-width and stored in host byte order.
//!
//! ## Example
//! ```rust,no_run
//! use std::path::Path;
//! use tad_format::{Array, ElementType, TadStream};
//!
//! // Writing
//! let mut array = Array::new([800, 600], 3, ElementType::Uint8).unwrap();
//! array.global_tags_mut().set("TITLE", "snapshot").unwrap();
//! let mut out = TadStream::create(Path::new("image.tad")).unwrap();
//! out.write_array(&array).unwrap();
//! out.close().unwrap();
//!
//! // Reading
//! let mut input = TadStream::open(Path::new("image.tad")).unwrap();
//! while input.has_more().unwrap() {
//!     let array = input.read_next().unwrap();
//!     println!("{:?} {}", array.dimensions(), array.element_type());
//! }
//! ```

pub mod array;
pub mod element;
pub mod error;
pub mod format;
pub mod header;
pub mod statistics;
pub mod stream;
pub mod taglist;

pub use array::Array;
pub use element::{ElementType, UnknownElementType};
pub use error::{ErrorKind, Result, TadError};
pub use format::{
    canonical_format, format_name, load, open_format, open_format_with_options, save,
    ArrayFormat, Exporter, Importer, FORMAT_HINT,
};
pub use header::*;
pub use statistics::ComponentStatistics;
pub use stream::{StreamOptions, StreamState, TadStream};
pub use taglist::TagList;
