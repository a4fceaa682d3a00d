//! Multi-array stream: sequential and indexed access to `.tad` files.
//!
//! A TAD file is a plain concatenation of self-describing array records, so
//! a stream can be appended to at any time and read front to back without an
//! index. Random access is provided by a lazily built offset index: the first
//! call to [`TadStream::array_count`] or [`TadStream::read_at`] walks the file
//! once, recording where each record starts.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tad_format::{Array, ElementType, TadStream};
//!
//! let mut array = Array::from_data([2, 2], 1, ElementType::Uint8, vec![10, 20, 30, 40]).unwrap();
//! array.global_tags_mut().set("UNIT", "meters").unwrap();
//!
//! let mut out = TadStream::create(Path::new("grid.tad")).unwrap();
//! out.write_array(&array).unwrap();
//! out.close().unwrap();
//!
//! let mut input = TadStream::open(Path::new("grid.tad")).unwrap();
//! assert_eq!(input.array_count().unwrap(), Some(1));
//! let first = input.read_at(0).unwrap();
//! assert_eq!(first.global_tags().get("UNIT"), Some("meters"));
//! ```

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::mem;
use std::path::Path;

use crate::array::Array;
use crate::error::{Result, TadError};
use crate::header::ArrayHeader;
use crate::taglist::TagList;

/// Default per-allocation memory limit (4 GiB).
///
/// The limit also applies to payloads, so an array larger than this is
/// written fine but reading it back needs a raised limit, see
/// [`StreamOptions::with_allocation_limit`].
pub const DEFAULT_ALLOCATION_LIMIT: u64 = 4 * 1024 * 1024 * 1024;

/// Default cap on the number of arrays an index may hold.
pub const DEFAULT_MAX_ARRAY_COUNT: usize = i32::MAX as usize;

/// Which way a [`TadStream`] is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Closed,
    OpenForRead,
    OpenForWrite,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Closed => "closed",
            StreamState::OpenForRead => "open for reading",
            StreamState::OpenForWrite => "open for writing",
        };
        f.write_str(s)
    }
}

/// Tunables applied when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Largest tag-list body or payload a single read may allocate, in bytes.
    /// Bodies that are present but larger fail with
    /// [`TadError::AllocationTooLarge`]; `u64::MAX` disables the check.
    pub allocation_limit: u64,
    /// Largest number of arrays the offset index may record. A file with
    /// more arrays reports an unknown count and does not support seeking.
    pub max_array_count: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            allocation_limit: DEFAULT_ALLOCATION_LIMIT,
            max_array_count: DEFAULT_MAX_ARRAY_COUNT,
        }
    }
}

impl StreamOptions {
    pub fn with_allocation_limit(mut self, limit: u64) -> Self {
        self.allocation_limit = limit;
        self
    }

    pub fn with_max_array_count(mut self, count: usize) -> Self {
        self.max_array_count = count;
        self
    }
}

/// Offsets of every record start, built on first demand.
#[derive(Debug)]
enum OffsetIndex {
    Unscanned,
    /// A scan was attempted and failed; the count is unknown.
    Unknown,
    Known(Vec<u64>),
}

enum Handle {
    Closed,
    Reading {
        inner: BufReader<File>,
        index: OffsetIndex,
    },
    Writing(BufWriter<File>),
}

/// A TAD file opened for reading or writing.
///
/// The stream owns its file handle and cursor. Reading and writing are
/// exclusive: a stream is [`StreamState::Closed`], open for reading, or open
/// for writing, and operations that do not match the current state fail with
/// [`TadError::InvalidState`].
pub struct TadStream {
    handle: Handle,
    options: StreamOptions,
}

impl Default for TadStream {
    fn default() -> Self {
        Self::new()
    }
}

impl TadStream {
    /// A closed stream with default options.
    pub fn new() -> Self {
        Self::with_options(StreamOptions::default())
    }

    pub fn with_options(options: StreamOptions) -> Self {
        Self {
            handle: Handle::Closed,
            options,
        }
    }

    /// Open an existing file for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let mut stream = Self::new();
        stream.open_for_reading(path)?;
        Ok(stream)
    }

    /// Create (or truncate) a file for writing.
    pub fn create(path: &Path) -> Result<Self> {
        let mut stream = Self::new();
        stream.open_for_writing(path, false)?;
        Ok(stream)
    }

    /// Open a file for appending further arrays, creating it if needed.
    pub fn append(path: &Path) -> Result<Self> {
        let mut stream = Self::new();
        stream.open_for_writing(path, true)?;
        Ok(stream)
    }

    pub fn state(&self) -> StreamState {
        match self.handle {
            Handle::Closed => StreamState::Closed,
            Handle::Reading { .. } => StreamState::OpenForRead,
            Handle::Writing(_) => StreamState::OpenForWrite,
        }
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Set the maximum size in bytes for a single memory allocation when
    /// reading tag lists or payloads. Set to `u64::MAX` to disable.
    pub fn set_allocation_limit(&mut self, limit: u64) {
        self.options.allocation_limit = limit;
    }

    /// Open `path` for reading. The stream must be closed.
    ///
    /// # Errors
    ///
    /// - [`TadError::InvalidState`] if the stream is already open.
    /// - [`TadError::Io`] if the file cannot be opened.
    pub fn open_for_reading(&mut self, path: &Path) -> Result<()> {
        self.expect_closed("open a file")?;
        tracing::info!("Opening TAD file: {}", path.display());

        let file = File::open(path)?;
        self.handle = Handle::Reading {
            inner: BufReader::new(file),
            index: OffsetIndex::Unscanned,
        };
        Ok(())
    }

    /// Open `path` for writing. With `append`, new arrays are added after the
    /// existing ones; otherwise the file is truncated.
    ///
    /// # Errors
    ///
    /// - [`TadError::InvalidState`] if the stream is already open.
    /// - [`TadError::Io`] if the file cannot be created or opened.
    pub fn open_for_writing(&mut self, path: &Path, append: bool) -> Result<()> {
        self.expect_closed("open a file")?;
        tracing::info!(append, "Creating TAD file: {}", path.display());

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(path)?;
        self.handle = Handle::Writing(BufWriter::new(file));
        Ok(())
    }

    /// Flush pending output and release the file handle.
    ///
    /// The stream is closed afterwards even if flushing fails. Closing a
    /// closed stream does nothing.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.handle, Handle::Closed) {
            Handle::Closed | Handle::Reading { .. } => Ok(()),
            Handle::Writing(mut writer) => {
                writer.flush()?;
                tracing::debug!("Closed TAD file after writing");
                Ok(())
            }
        }
    }

    /// Whether another record follows the cursor. Does not move the cursor.
    pub fn has_more(&mut self) -> Result<bool> {
        let state = self.state();
        let Handle::Reading { inner, .. } = &mut self.handle else {
            return Err(TadError::InvalidState {
                operation: "check for more arrays",
                state,
            });
        };
        Ok(!inner.fill_buf()?.is_empty())
    }

    /// Number of arrays in the file, or `None` if it cannot be determined.
    ///
    /// The first call scans the whole file once and records the start of
    /// every record. If any record fails to decode, or the file holds more
    /// than [`StreamOptions::max_array_count`] arrays, the count is unknown.
    /// The cursor is left where it was.
    pub fn array_count(&mut self) -> Result<Option<usize>> {
        let state = self.state();
        let Handle::Reading { inner, index } = &mut self.handle else {
            return Err(TadError::InvalidState {
                operation: "count arrays",
                state,
            });
        };

        if matches!(index, OffsetIndex::Unscanned) {
            let position = inner.stream_position()?;
            let scanned = build_index(inner, &self.options);
            let restored = inner.seek(SeekFrom::Start(position));
            *index = match scanned {
                Ok(offsets) => {
                    tracing::info!(count = offsets.len(), "Built array index");
                    OffsetIndex::Known(offsets)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Array index unavailable; count is unknown");
                    OffsetIndex::Unknown
                }
            };
            restored?;
        }

        Ok(match index {
            OffsetIndex::Known(offsets) => Some(offsets.len()),
            _ => None,
        })
    }

    /// Decode the record at the cursor and advance past it.
    ///
    /// # Errors
    ///
    /// - [`TadError::Io`] on a short read, including a truncated payload.
    /// - [`TadError::AllocationTooLarge`] if a tag list or the payload is
    ///   present in full but larger than the allocation limit.
    /// - [`TadError::InvalidTagList`] if a tag list declares more bytes than
    ///   the file holds.
    /// - Any decoding error from the header or tag lists.
    pub fn read_next(&mut self) -> Result<Array> {
        let state = self.state();
        let Handle::Reading { inner, .. } = &mut self.handle else {
            return Err(TadError::InvalidState {
                operation: "read an array",
                state,
            });
        };
        let offset = inner.stream_position()?;
        let array = read_record(inner, self.options.allocation_limit)?;
        tracing::debug!(
            offset,
            size = array.data_size(),
            element_type = %array.element_type(),
            "Read array"
        );
        Ok(array)
    }

    /// Decode the array with ordinal `index`, leaving the cursor after it.
    ///
    /// # Errors
    ///
    /// - [`TadError::SeekingNotSupported`] if the index could not be built.
    /// - [`TadError::IndexOutOfRange`] if `index` is not below the count.
    pub fn read_at(&mut self, index: usize) -> Result<Array> {
        let count = self.array_count()?;
        let Handle::Reading {
            inner,
            index: OffsetIndex::Known(offsets),
            ..
        } = &mut self.handle
        else {
            return Err(TadError::SeekingNotSupported);
        };
        let Some(&offset) = offsets.get(index) else {
            return Err(TadError::IndexOutOfRange {
                index,
                count: count.unwrap_or(0),
            });
        };

        tracing::debug!(index, offset, "Seeking to array");
        inner.seek(SeekFrom::Start(offset))?;
        read_record(inner, self.options.allocation_limit)
    }

    /// Append one complete record.
    ///
    /// The array is checked before anything is written, so an invalid array
    /// leaves the file untouched.
    pub fn write_array(&mut self, array: &Array) -> Result<()> {
        let state = self.state();
        let Handle::Writing(writer) = &mut self.handle else {
            return Err(TadError::InvalidState {
                operation: "write an array",
                state,
            });
        };

        // --- 1. Validate ---
        let header = array.header();
        header.validate()?;
        let expected = header.payload_size()?;
        if expected != array.data_size() {
            return Err(TadError::PayloadSizeMismatch {
                expected,
                actual: array.data_size(),
            });
        }
        check_group_len("component", array.all_component_tags(), header.component_count)?;
        check_group_len("dimension", array.all_dimension_tags(), header.dimension_count())?;

        // --- 2. Header and tag lists ---
        header.encode(writer)?;
        array.global_tags().encode(writer)?;
        for tags in array.all_component_tags() {
            tags.encode(writer)?;
        }
        for tags in array.all_dimension_tags() {
            tags.encode(writer)?;
        }

        // --- 3. Payload ---
        writer.write_all(array.data())?;

        tracing::debug!(
            size = array.data_size(),
            element_type = %array.element_type(),
            dimensions = ?array.dimensions(),
            "Wrote array"
        );
        Ok(())
    }

    /// Forget the offset index so the next count or seek rescans the file.
    /// Has no effect unless the stream is open for reading.
    pub fn invalidate_index(&mut self) {
        if let Handle::Reading { index, .. } = &mut self.handle {
            *index = OffsetIndex::Unscanned;
        }
    }

    // ---------------------------------------------------------------
    // Private helpers
    // ---------------------------------------------------------------

    fn expect_closed(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            StreamState::Closed => Ok(()),
            state => Err(TadError::InvalidState { operation, state }),
        }
    }
}

impl fmt::Debug for TadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TadStream")
            .field("state", &self.state())
            .field("options", &self.options)
            .finish()
    }
}

/// Decode one full record at the reader's position.
fn read_record<R: Read>(reader: &mut R, allocation_limit: u64) -> Result<Array> {
    let (header, global_tags, component_tags, dimension_tags) =
        read_record_meta(reader, allocation_limit)?;

    let size = header.payload_size()?;
    if size > allocation_limit {
        let available = io::copy(&mut reader.by_ref().take(size), &mut io::sink())?;
        if available < size {
            return Err(truncated_payload(size, available));
        }
    }
    check_allocation(size, allocation_limit)?;
    let mut data = Vec::new();
    data.try_reserve_exact(size as usize)
        .map_err(|_| TadError::AllocationTooLarge {
            requested: size,
            limit: allocation_limit,
        })?;
    reader.by_ref().take(size).read_to_end(&mut data)?;
    if (data.len() as u64) < size {
        return Err(truncated_payload(size, data.len() as u64));
    }

    Ok(Array::from_parts(
        header,
        global_tags,
        component_tags,
        dimension_tags,
        data,
    ))
}

type RecordMeta = (ArrayHeader, TagList, Vec<TagList>, Vec<TagList>);

/// Decode a record's header and all of its tag lists.
fn read_record_meta<R: Read>(reader: &mut R, allocation_limit: u64) -> Result<RecordMeta> {
    let header = ArrayHeader::decode(reader)?;
    let global_tags = TagList::decode(reader, allocation_limit)?;
    // Each tag list needs at least its 8-byte prefix, so a hostile count
    // runs out of input long before the vectors grow large.
    let component_tags = (0..header.component_count)
        .map(|_| TagList::decode(reader, allocation_limit))
        .collect::<Result<Vec<_>>>()?;
    let dimension_tags = (0..header.dimension_count())
        .map(|_| TagList::decode(reader, allocation_limit))
        .collect::<Result<Vec<_>>>()?;
    Ok((header, global_tags, component_tags, dimension_tags))
}

/// Walk every record from the start of the file and collect their offsets.
/// The caller restores the cursor.
fn build_index(inner: &mut BufReader<File>, options: &StreamOptions) -> Result<Vec<u64>> {
    // Taken at scan time so arrays appended since opening are seen.
    let file_size = inner.get_ref().metadata()?.len();
    let mut offsets = Vec::new();
    inner.seek(SeekFrom::Start(0))?;

    while !inner.fill_buf()?.is_empty() {
        if offsets.len() >= options.max_array_count {
            return Err(TadError::FeaturesUnsupported(format!(
                "file holds more than {} arrays",
                options.max_array_count
            )));
        }
        let offset = inner.stream_position()?;
        let (header, ..) = read_record_meta(inner, options.allocation_limit)?;

        // Skip the payload without reading it.
        let size = header.payload_size()?;
        let skip = i64::try_from(size).map_err(|_| TadError::OutOfRange {
            field: "payload size",
            value: size,
        })?;
        inner.seek_relative(skip)?;
        let end = inner.stream_position()?;
        if end > file_size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("array {} payload ends at {end}, past end of file", offsets.len()),
            )
            .into());
        }

        tracing::debug!(index = offsets.len(), offset, size, "Indexed array");
        offsets.push(offset);
    }
    Ok(offsets)
}

fn truncated_payload(expected: u64, actual: u64) -> TadError {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("array payload truncated: expected {expected} bytes, got {actual}"),
    )
    .into()
}

fn check_allocation(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(TadError::AllocationTooLarge {
            requested: size,
            limit,
        });
    }
    Ok(())
}

fn check_group_len(group: &str, tags: &[TagList], expected: u64) -> Result<()> {
    if tags.len() as u64 != expected {
        return Err(TadError::InvalidTagList(format!(
            "{} {group} tag lists for {expected} {group}s",
            tags.len()
        )));
    }
    Ok(())
}
