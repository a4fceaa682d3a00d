//! Format backends and the lazy importer/exporter facades.
//!
//! Every file format is exposed through the [`ArrayFormat`] trait. The
//! backend for a file is chosen by name: either the `FORMAT` hint or the
//! file name extension, normalised through a table of common aliases
//! (`jpg` is `jpeg`, `pgm` is `pnm`, and so on). Only the native `tad`
//! backend is built into this crate; any other name yields
//! [`TadError::FormatUnsupported`].

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::array::Array;
use crate::error::{Result, TadError};
use crate::stream::{StreamOptions, TadStream};
use crate::taglist::TagList;

/// Hint key that selects a format by name, overriding the file extension.
pub const FORMAT_HINT: &str = "FORMAT";

/// Capabilities shared by all array file formats.
///
/// Single-array formats report a count of `Some(1)`, reject `append` with
/// [`TadError::FeaturesUnsupported`] and reject ordinals other than 0 with
/// [`TadError::SeekingNotSupported`].
pub trait ArrayFormat: Send {
    /// Short lowercase format name, e.g. `"tad"`.
    fn name(&self) -> &str;

    fn open_for_reading(&mut self, path: &Path, hints: &TagList) -> Result<()>;

    fn open_for_writing(&mut self, path: &Path, append: bool, hints: &TagList) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// `Some(n)` if the number of arrays is known, `None` otherwise.
    fn array_count(&mut self) -> Result<Option<usize>>;

    fn has_more(&mut self) -> Result<bool>;

    fn read_next(&mut self) -> Result<Array>;

    fn read_at(&mut self, index: usize) -> Result<Array>;

    fn write_array(&mut self, array: &Array) -> Result<()>;
}

impl ArrayFormat for TadStream {
    fn name(&self) -> &str {
        "tad"
    }

    fn open_for_reading(&mut self, path: &Path, _hints: &TagList) -> Result<()> {
        TadStream::open_for_reading(self, path)
    }

    fn open_for_writing(&mut self, path: &Path, append: bool, _hints: &TagList) -> Result<()> {
        TadStream::open_for_writing(self, path, append)
    }

    fn close(&mut self) -> Result<()> {
        TadStream::close(self)
    }

    fn array_count(&mut self) -> Result<Option<usize>> {
        TadStream::array_count(self)
    }

    fn has_more(&mut self) -> Result<bool> {
        TadStream::has_more(self)
    }

    fn read_next(&mut self) -> Result<Array> {
        TadStream::read_next(self)
    }

    fn read_at(&mut self, index: usize) -> Result<Array> {
        TadStream::read_at(self, index)
    }

    fn write_array(&mut self, array: &Array) -> Result<()> {
        TadStream::write_array(self, array)
    }
}

/// Map a format name or extension onto the backend that handles it.
pub fn canonical_format(name: &str) -> &str {
    match name {
        "pbm" | "pgm" | "ppm" | "pnm" | "pam" | "pfm" => "pnm",
        "hdr" | "pic" => "rgbe",
        "dcm" | "dicom" => "dcmtk",
        "fit" => "fits",
        "mp4" | "m4v" | "mkv" | "ogv" | "mpeg" | "mpg" | "mov" | "avi" | "wmv" | "gif"
        | "dds" | "bmp" | "tga" => "ffmpeg",
        "vrt" | "tsx" => "gdal",
        "h5" | "he5" | "hdf5" => "hdf5",
        "jpg" => "jpeg",
        "tif" => "tiff",
        other => other,
    }
}

/// Determine the format of `path`: the `FORMAT` hint if present, otherwise
/// the lowercased file extension. The result is normalised with
/// [`canonical_format`]. Returns an empty string if neither is available.
pub fn format_name(path: &Path, hints: &TagList) -> String {
    let raw = match hints.get(FORMAT_HINT) {
        Some(format) => format.to_string(),
        None => path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
    };
    canonical_format(&raw).to_string()
}

/// Create a closed backend for the named format.
///
/// # Errors
///
/// Returns [`TadError::FormatUnsupported`] if no backend handles `name`.
pub fn open_format(name: &str) -> Result<Box<dyn ArrayFormat>> {
    open_format_with_options(name, StreamOptions::default())
}

/// Like [`open_format`], applying `options` to backends that honour them.
pub fn open_format_with_options(
    name: &str,
    options: StreamOptions,
) -> Result<Box<dyn ArrayFormat>> {
    match canonical_format(name) {
        "tad" => Ok(Box::new(TadStream::with_options(options))),
        "" => Err(TadError::FormatUnsupported(
            "cannot determine format: no FORMAT hint and no file extension".into(),
        )),
        other => Err(TadError::FormatUnsupported(format!(
            "no backend for format '{other}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Reads arrays from a file of any supported format.
///
/// The file is opened on the first read or query, not on construction, so
/// creating an importer never fails. Resolution errors surface from the
/// first operation (or from [`Importer::check_access`]).
pub struct Importer {
    path: PathBuf,
    hints: TagList,
    format: String,
    backend: Option<Box<dyn ArrayFormat>>,
    opened: bool,
}

impl Importer {
    pub fn new(path: impl Into<PathBuf>, hints: &TagList) -> Self {
        Self::with_options(path, hints, StreamOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, hints: &TagList, options: StreamOptions) -> Self {
        let path = path.into();
        let format = format_name(&path, hints);
        let backend = open_format_with_options(&format, options).ok();
        Self {
            path,
            hints: hints.clone(),
            format,
            backend,
            opened: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The resolved format name.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Check that the format is supported and the file can be opened,
    /// without keeping it open.
    pub fn check_access(&self) -> Result<()> {
        if self.backend.is_none() {
            return Err(unsupported(&self.format));
        }
        File::open(&self.path)?;
        Ok(())
    }

    pub fn array_count(&mut self) -> Result<Option<usize>> {
        self.ensure_open()?.array_count()
    }

    pub fn has_more(&mut self) -> Result<bool> {
        self.ensure_open()?.has_more()
    }

    pub fn read_next(&mut self) -> Result<Array> {
        self.ensure_open()?.read_next()
    }

    pub fn read_at(&mut self, index: usize) -> Result<Array> {
        self.ensure_open()?.read_at(index)
    }

    fn ensure_open(&mut self) -> Result<&mut dyn ArrayFormat> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(unsupported(&self.format));
        };
        if !self.opened {
            backend.open_for_reading(&self.path, &self.hints)?;
            self.opened = true;
        }
        Ok(&mut **backend)
    }
}

impl Drop for Importer {
    fn drop(&mut self) {
        if let (Some(backend), true) = (self.backend.as_mut(), self.opened) {
            let _ = backend.close();
        }
    }
}

// ---------------------------------------------------------------------------
// Exporter
// ---------------------------------------------------------------------------

/// Writes arrays to a file of any supported format.
///
/// The file is created (or opened for appending) on the first
/// [`Exporter::write_array`]. Call [`Exporter::finish`] to observe errors
/// from the final flush; dropping an exporter closes it and ignores them.
pub struct Exporter {
    path: PathBuf,
    append: bool,
    hints: TagList,
    format: String,
    backend: Option<Box<dyn ArrayFormat>>,
    opened: bool,
}

impl Exporter {
    pub fn new(path: impl Into<PathBuf>, append: bool, hints: &TagList) -> Self {
        let path = path.into();
        let format = format_name(&path, hints);
        let backend = open_format(&format).ok();
        Self {
            path,
            append,
            hints: hints.clone(),
            format,
            backend,
            opened: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Whether the output file has been opened, which happens on the first
    /// write. Until then the file at [`Exporter::path`] is untouched.
    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn write_array(&mut self, array: &Array) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(unsupported(&self.format));
        };
        if !self.opened {
            backend.open_for_writing(&self.path, self.append, &self.hints)?;
            self.opened = true;
        }
        backend.write_array(array)
    }

    /// Close the file, reporting any error from the final flush.
    pub fn finish(mut self) -> Result<()> {
        self.close_backend()
    }

    fn close_backend(&mut self) -> Result<()> {
        if !self.opened {
            return Ok(());
        }
        self.opened = false;
        match self.backend.as_mut() {
            Some(backend) => backend.close(),
            None => Ok(()),
        }
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        let _ = self.close_backend();
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Read the first array from `path`, choosing the format by extension.
pub fn load(path: impl AsRef<Path>) -> Result<Array> {
    Importer::new(path.as_ref(), &TagList::new()).read_next()
}

/// Write `array` as the only array of a new file at `path`.
pub fn save(path: impl AsRef<Path>, array: &Array) -> Result<()> {
    let mut exporter = Exporter::new(path.as_ref(), false, &TagList::new());
    exporter.write_array(array)?;
    exporter.finish()
}

fn unsupported(format: &str) -> TadError {
    if format.is_empty() {
        TadError::FormatUnsupported(
            "cannot determine format: no FORMAT hint and no file extension".into(),
        )
    } else {
        TadError::FormatUnsupported(format!("no backend for format '{format}'"))
    }
}
