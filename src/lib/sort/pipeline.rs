//! Coordinate sort driver.
//!
//! Ties the passes together: key extraction, in-memory radix sort, batch
//! sizing from the memory budget, header rewrite, and the chunked reorder
//! that writes the output. No temporary files are written; memory is
//! bounded by the key array plus one batch of decoded records.

use anyhow::{Result, bail};
use log::info;
use std::path::Path;

use crate::bam_io::{create_alignment_writer, is_stdin_path, open_alignment_reader};
use crate::header::{add_pg_record, set_coordinate_sorted};
use crate::logging::format_count;
use crate::sort::extract::extract_keys;
use crate::sort::keys::SortContext;
use crate::sort::radix::radix_sort_keys;
use crate::sort::reorder::reorder_records;

/// Statistics from a completed sort.
#[derive(Debug, Clone, Copy)]
pub struct SortStats {
    /// Records read and written.
    pub total_records: u64,
    /// Malformed SAM lines skipped.
    pub skipped_records: u64,
    /// Records per output batch.
    pub batch_size: usize,
    /// Number of rescans of the source.
    pub batches: u64,
}

/// Memory-bounded coordinate sorter.
///
/// Configured with builder-style methods, then run with [`sort`](Self::sort):
///
/// ```no_run
/// use bamsort_lib::sort::CoordinateSorter;
/// use std::path::Path;
///
/// # fn main() -> anyhow::Result<()> {
/// let stats = CoordinateSorter::new()
///     .memory_limit(512 * 1024 * 1024)
///     .threads(4)
///     .sort(Path::new("in.bam"), Path::new("out.bam"))?;
/// # Ok(())
/// # }
/// ```
pub struct CoordinateSorter {
    memory_limit: usize,
    threads: usize,
    compression_level: u32,
    ignore_sam_errors: bool,
    pg_info: Option<(String, String)>,
}

impl Default for CoordinateSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateSorter {
    /// Create a sorter with default settings (768 MB budget, one thread).
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory_limit: 768 * 1024 * 1024,
            threads: 1,
            compression_level: 1,
            ignore_sam_errors: false,
            pg_info: None,
        }
    }

    /// Memory budget, in bytes, for the decoded record batch.
    #[must_use]
    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Thread count for BGZF compression and decompression.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// BGZF compression level for BAM output.
    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Skip unparseable SAM lines instead of failing.
    #[must_use]
    pub fn ignore_sam_errors(mut self, ignore: bool) -> Self {
        self.ignore_sam_errors = ignore;
        self
    }

    /// Record a @PG entry in the output header (version, command line).
    #[must_use]
    pub fn pg_info(mut self, version: String, command_line: String) -> Self {
        self.pg_info = Some((version, command_line));
        self
    }

    /// Sort `input` into coordinate order at `output`.
    ///
    /// # Errors
    /// Fails on unreadable or truncated input, records referencing
    /// sequences outside the header, and output I/O errors.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        if is_stdin_path(input) {
            bail!("input must be a seekable file: the source is re-read once per batch");
        }

        // Pass 1: keys only.
        let (mut reader, header) = open_alignment_reader(input, self.threads)?;
        let context = SortContext::from_header(&header);
        let mut extracted = extract_keys(&mut reader, &header, &context, self.ignore_sam_errors)?;
        drop(reader);

        let n = extracted.keys.len();
        info!("Indexed {} records", format_count(n as u64));
        if extracted.skipped > 0 {
            info!("Skipped {} malformed SAM lines", format_count(extracted.skipped));
        }

        radix_sort_keys(&mut extracted.keys, &context);

        let batch_size = self.batch_size(n, extracted.total_bytes);
        let batches = (n as u64).div_ceil(batch_size as u64);
        info!(
            "Reordering in {} batch(es) of up to {} records",
            format_count(batches.max(1)),
            format_count(batch_size as u64)
        );

        // The output header declares the new order before any record lands.
        let mut output_header = header.clone();
        set_coordinate_sorted(&mut output_header)?;
        if let Some((version, command_line)) = &self.pg_info {
            add_pg_record(&mut output_header, version, command_line)?;
        }

        let mut writer =
            create_alignment_writer(output, &output_header, self.threads, self.compression_level)?;

        let written = if n == 0 {
            0
        } else {
            reorder_records(
                input,
                &output_header,
                &context,
                &extracted.keys,
                batch_size,
                self.threads,
                self.ignore_sam_errors,
                &mut writer,
            )?
        };
        writer.finish()?;

        Ok(SortStats {
            total_records: written,
            skipped_records: extracted.skipped,
            batch_size,
            batches,
        })
    }

    /// Batch record count from the byte budget and the measured mean record
    /// size, clamped to `1..=n`.
    fn batch_size(&self, n: usize, total_bytes: u64) -> usize {
        if n == 0 {
            return 1;
        }
        let mean = (total_bytes / n as u64).max(1);
        (self.memory_limit as u64 / mean).clamp(1, n as u64) as usize
    }
}
