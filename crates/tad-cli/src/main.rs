//! TAD CLI: command-line interface for Tagged Array Data files.
//!
//! Inspects `.tad` files and rearranges the arrays they contain: printing
//! shapes, tags and per-component statistics, converting between formats,
//! counting arrays, concatenating files, extracting a single array by index,
//! and rewriting global tags.
//!
//! # Usage
//!
//! ```bash
//! tad info volume.tad
//! tad info volume.tad --json
//! tad info volume.tad --statistics
//! tad -O tad convert volume.dat volume.tad
//! tad count volume.tad
//! tad cat a.tad b.tad -o joined.tad
//! tad extract joined.tad --index 2 -o third.tad
//! tad tag joined.tad -o tagged.tad --set UNIT=meters --unset COMMENT
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use tad_format::{
    Array, ComponentStatistics, Exporter, Importer, StreamOptions, TagList, FORMAT_HINT,
};

// ───────────────────────────── CLI definition ─────────────────────────────

/// Top-level CLI entry point for the `tad` binary.
#[derive(Parser)]
#[command(
    name = "tad",
    about = "TAD (Tagged Array Data) -- inspect and rearrange multi-array files",
    version
)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Format of input files, overriding the file name extension.
    #[arg(short = 'i', long, global = true)]
    input_format: Option<String>,

    /// Format of the output file, overriding the file name extension.
    #[arg(short = 'O', long, global = true)]
    output_format: Option<String>,

    /// Largest tag list or payload a single read may allocate, in MiB.
    #[arg(long, global = true, default_value_t = 4096)]
    allocation_limit_mib: u64,

    #[command(subcommand)]
    command: Commands,
}

/// Available sub-commands.
#[derive(Subcommand)]
enum Commands {
    /// Print the shape, type and tags of every array in a file.
    Info {
        /// Input file path.
        input: PathBuf,

        /// Output the information as JSON.
        #[arg(long)]
        json: bool,

        /// Also print min, max, mean, variance and deviation per component.
        #[arg(short, long)]
        statistics: bool,
    },

    /// Copy every array of a file into another file, changing only the
    /// container format.
    Convert {
        /// Input file path.
        input: PathBuf,

        /// Output file path.
        output: PathBuf,
    },

    /// Print the number of arrays in a file, or "unknown".
    Count {
        /// Input file path.
        input: PathBuf,
    },

    /// Concatenate all arrays of the input files into one output file.
    Cat {
        /// Input file paths, in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,

        /// Append to the output file instead of replacing it.
        #[arg(short, long)]
        append: bool,
    },

    /// Copy a single array, selected by index, into a new file.
    Extract {
        /// Input file path.
        input: PathBuf,

        /// Zero-based index of the array to copy.
        #[arg(short = 'n', long)]
        index: usize,

        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Rewrite the global tags of every array (or one) into a new file.
    Tag {
        /// Input file path.
        input: PathBuf,

        /// Output file path. Must differ from the input.
        #[arg(short, long)]
        output: PathBuf,

        /// Only modify the array with this zero-based index.
        #[arg(short = 'n', long)]
        index: Option<usize>,

        /// Set a tag, as KEY=VALUE. May be repeated.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Remove a tag. May be repeated.
        #[arg(long = "unset", value_name = "KEY")]
        unset: Vec<String>,
    },
}

// ────────────────────────────── main ──────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let io = IoSettings {
        input_hints: format_hints(cli.input_format.as_deref())?,
        output_hints: format_hints(cli.output_format.as_deref())?,
        options: StreamOptions::default()
            .with_allocation_limit(cli.allocation_limit_mib.saturating_mul(1024 * 1024)),
    };

    match cli.command {
        Commands::Info {
            input,
            json,
            statistics,
        } => cmd_info(&io, &input, json, statistics),
        Commands::Convert { input, output } => cmd_convert(&io, &input, &output),
        Commands::Count { input } => cmd_count(&io, &input),
        Commands::Cat {
            inputs,
            output,
            append,
        } => cmd_cat(&io, &inputs, &output, append),
        Commands::Extract {
            input,
            index,
            output,
        } => cmd_extract(&io, &input, index, &output),
        Commands::Tag {
            input,
            output,
            index,
            set,
            unset,
        } => cmd_tag(&io, &input, &output, index, &set, &unset),
    }
}

/// Format hints and read options shared by all commands.
struct IoSettings {
    input_hints: TagList,
    output_hints: TagList,
    options: StreamOptions,
}

impl IoSettings {
    /// Create an importer and verify the file can be read.
    fn importer(&self, path: &Path) -> Result<Importer> {
        let importer = Importer::with_options(path, &self.input_hints, self.options);
        importer
            .check_access()
            .with_context(|| format!("Cannot read {}", path.display()))?;
        tracing::debug!(format = importer.format(), "Resolved input format: {}", path.display());
        Ok(importer)
    }

    fn exporter(&self, path: &Path, append: bool) -> Exporter {
        Exporter::new(path, append, &self.output_hints)
    }

    /// Create or replace `path` with whatever `write` exports. If anything
    /// fails after the file was opened, it is removed again.
    fn write_new<T>(
        &self,
        path: &Path,
        write: impl FnOnce(&mut Exporter) -> Result<T>,
    ) -> Result<T> {
        let mut exporter = self.exporter(path, false);
        let written = write(&mut exporter);
        let opened = exporter.is_open();
        let result = written.and_then(|value| {
            exporter
                .finish()
                .with_context(|| format!("Failed to finish {}", path.display()))?;
            Ok(value)
        });
        if result.is_err() && opened {
            discard_output(path);
        }
        result
    }
}

fn discard_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed incomplete output {}", path.display()),
        Err(e) => tracing::warn!(error = %e, "Could not remove {}", path.display()),
    }
}

fn format_hints(format: Option<&str>) -> Result<TagList> {
    let mut hints = TagList::new();
    if let Some(format) = format {
        hints
            .set(FORMAT_HINT, format)
            .with_context(|| format!("Invalid format name: {format:?}"))?;
    }
    Ok(hints)
}

// ───────────────────────────── info ─────────────────────────────

/// Print information about every array in a file.
///
/// Arrays are read sequentially, so files without a usable index still
/// print everything up to the first unreadable record.
fn cmd_info(io: &IoSettings, input: &Path, json: bool, statistics: bool) -> Result<()> {
    let mut importer = io.importer(input)?;

    let mut infos = Vec::new();
    while importer
        .has_more()
        .with_context(|| format!("Failed to read {}", input.display()))?
    {
        let index = infos.len();
        let array = importer
            .read_next()
            .with_context(|| format!("Failed to read array {index} of {}", input.display()))?;
        let info = ArrayInfo::new(index, &array, statistics);
        if !json {
            info.print_human();
        }
        infos.push(info);
    }

    if json {
        let doc = FileInfo {
            path: input.display().to_string(),
            arrays: infos,
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }
    Ok(())
}

/// JSON document printed by `tad info --json`.
#[derive(Serialize)]
struct FileInfo {
    path: String,
    arrays: Vec<ArrayInfo>,
}

/// Summary of one array, used for both output styles.
#[derive(Serialize)]
struct ArrayInfo {
    index: usize,
    element_type: String,
    component_count: u64,
    dimensions: Vec<u64>,
    data_size: u64,
    global_tags: TagList,
    dimension_tags: Vec<TagList>,
    component_tags: Vec<TagList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<Vec<ComponentStatistics>>,
}

impl ArrayInfo {
    fn new(index: usize, array: &Array, statistics: bool) -> Self {
        Self {
            index,
            element_type: array.element_type().to_string(),
            component_count: array.component_count(),
            dimensions: array.dimensions().to_vec(),
            data_size: array.data_size(),
            global_tags: array.global_tags().clone(),
            dimension_tags: array.all_dimension_tags().to_vec(),
            component_tags: array.all_component_tags().to_vec(),
            statistics: statistics.then(|| ComponentStatistics::of_array(array)),
        }
    }

    fn print_human(&self) {
        let size = self
            .dimensions
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("x");
        println!(
            "array {}: {} x {}, size {} ({})",
            self.index,
            self.component_count,
            self.element_type,
            size,
            human_size(self.data_size)
        );
        if !self.global_tags.is_empty() {
            println!("  global:");
            print_tags(&self.global_tags);
        }
        for (i, tags) in self.dimension_tags.iter().enumerate() {
            if !tags.is_empty() {
                println!("  dimension {i}:");
                print_tags(tags);
            }
        }
        for (i, tags) in self.component_tags.iter().enumerate() {
            if !tags.is_empty() {
                println!("  component {i}:");
                print_tags(tags);
            }
        }
        for (i, s) in self.statistics.iter().flatten().enumerate() {
            println!(
                "  component {i}: min={} max={} mean={} var={} dev={}",
                format_g(s.min),
                format_g(s.max),
                format_g(s.mean),
                format_g(s.variance),
                format_g(s.deviation)
            );
        }
    }
}

fn print_tags(tags: &TagList) {
    for (key, value) in tags.iter() {
        println!("    {key}={value}");
    }
}

// ───────────────────────────── convert ─────────────────────────────

/// Copy all arrays of `input` into `output`. The two formats come from the
/// file name extensions unless `--input-format`/`--output-format` are given.
fn cmd_convert(io: &IoSettings, input: &Path, output: &Path) -> Result<()> {
    if same_file(input, output) {
        bail!("Output file {} is also the input", output.display());
    }

    let mut importer = io.importer(input)?;
    let written = io.write_new(output, |exporter| {
        let mut written = 0usize;
        while importer
            .has_more()
            .with_context(|| format!("Failed to read {}", input.display()))?
        {
            let array = importer.read_next().with_context(|| {
                format!("Failed to read array {written} of {}", input.display())
            })?;
            exporter
                .write_array(&array)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            written += 1;
        }
        Ok(written)
    })?;

    tracing::info!(
        arrays = written,
        format = importer.format(),
        "Wrote {}",
        output.display()
    );
    Ok(())
}

// ───────────────────────────── count ─────────────────────────────

fn cmd_count(io: &IoSettings, input: &Path) -> Result<()> {
    let mut importer = io.importer(input)?;
    let count = importer
        .array_count()
        .with_context(|| format!("Failed to count arrays in {}", input.display()))?;
    match count {
        Some(n) => println!("{n}"),
        None => println!("unknown"),
    }
    Ok(())
}

// ───────────────────────────── cat ─────────────────────────────

/// Copy all arrays of all inputs, in order, into `output`.
fn cmd_cat(io: &IoSettings, inputs: &[PathBuf], output: &Path, append: bool) -> Result<()> {
    if inputs.iter().any(|input| same_file(input, output)) {
        bail!("Output file {} is also an input", output.display());
    }

    let mut importers = inputs
        .iter()
        .map(|input| io.importer(input))
        .collect::<Result<Vec<_>>>()?;
    let mut exporter = io.exporter(output, append);

    let mut written = 0usize;
    for (importer, input) in importers.iter_mut().zip(inputs) {
        while importer
            .has_more()
            .with_context(|| format!("Failed to read {}", input.display()))?
        {
            let array = importer
                .read_next()
                .with_context(|| format!("Failed to read array from {}", input.display()))?;
            exporter
                .write_array(&array)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            written += 1;
        }
    }
    exporter
        .finish()
        .with_context(|| format!("Failed to finish {}", output.display()))?;

    tracing::info!(
        arrays = written,
        inputs = inputs.len(),
        "Wrote {}",
        output.display()
    );
    Ok(())
}

// ───────────────────────────── extract ─────────────────────────────

fn cmd_extract(io: &IoSettings, input: &Path, index: usize, output: &Path) -> Result<()> {
    if same_file(input, output) {
        bail!("Output file {} is also the input", output.display());
    }

    let mut importer = io.importer(input)?;
    let array = importer
        .read_at(index)
        .with_context(|| format!("Failed to read array {index} of {}", input.display()))?;

    let mut exporter = io.exporter(output, false);
    exporter
        .write_array(&array)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    exporter
        .finish()
        .with_context(|| format!("Failed to finish {}", output.display()))?;

    tracing::info!(index, size = array.data_size(), "Extracted array");
    Ok(())
}

// ───────────────────────────── tag ─────────────────────────────

/// Copy `input` to `output`, applying tag edits to the global tag list of
/// every array, or only the one at `only`.
fn cmd_tag(
    io: &IoSettings,
    input: &Path,
    output: &Path,
    only: Option<usize>,
    set: &[String],
    unset: &[String],
) -> Result<()> {
    if same_file(input, output) {
        bail!("Output file {} is also the input", output.display());
    }
    let assignments = set
        .iter()
        .map(|arg| parse_assignment(arg))
        .collect::<Result<Vec<_>>>()?;

    let mut importer = io.importer(input)?;
    if let Some(n) = only {
        let count = importer
            .array_count()
            .with_context(|| format!("Failed to count arrays in {}", input.display()))?;
        if let Some(count) = count.filter(|&count| n >= count) {
            bail!("Array index {n} out of range ({} holds {count} arrays)", input.display());
        }
    }

    let (arrays, modified) = io.write_new(output, |exporter| {
        let mut index = 0usize;
        let mut modified = 0usize;
        while importer
            .has_more()
            .with_context(|| format!("Failed to read {}", input.display()))?
        {
            let mut array = importer.read_next().with_context(|| {
                format!("Failed to read array {index} of {}", input.display())
            })?;
            if only.map_or(true, |n| n == index) {
                let tags = array.global_tags_mut();
                for key in unset {
                    tags.unset(key);
                }
                for (key, value) in &assignments {
                    tags.set(key.as_str(), value.as_str())
                        .with_context(|| format!("Invalid tag {key}={value}"))?;
                }
                modified += 1;
            }
            exporter
                .write_array(&array)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            index += 1;
        }

        // Only reachable when the file could not be counted up front.
        if let Some(n) = only.filter(|&n| n >= index) {
            bail!("Array index {n} out of range ({} holds {index} arrays)", input.display());
        }
        Ok((index, modified))
    })?;

    tracing::info!(arrays, modified, "Wrote {}", output.display());
    Ok(())
}

/// Split a `KEY=VALUE` argument. The value may be empty and may contain `=`.
fn parse_assignment(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("Expected KEY=VALUE, got {arg:?}"),
    }
}

// ───────────────────────────── helpers ─────────────────────────────

/// Whether two paths name the same file. Paths that cannot be resolved,
/// such as an output that does not exist yet, are compared as given.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Format a number like C's `%g`: six significant digits, trailing zeros
/// removed, exponent notation for very large or small magnitudes.
fn format_g(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = (5 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Format a byte count as a human-readable string.
fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TiB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KiB", bytes as f64 / KB as f64)
    } else if bytes == 1 {
        "1 byte".to_string()
    } else {
        format!("{} bytes", bytes)
    }
}
