//! Sort BAM/SAM files by genomic coordinate.
//!
//! Uses a memory-bounded sort-by-indirection design: one pass collects
//! fixed-size sort keys, an in-memory radix sort orders them, and the source
//! is re-read once per output batch to materialize records in sorted order.
//! No temporary files are written.

use anyhow::{Result, bail};
use clap::Parser;
use bamsort_lib::bam_io::is_stdin_path;
use bamsort_lib::logging::OperationTimer;
use bamsort_lib::sort::CoordinateSorter;
use bamsort_lib::validation::{validate_file_exists, validate_positive};
use log::info;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::CompressionOptions;

/// Sort a BAM or SAM file by coordinate.
///
/// Sorts alignment files into genomic coordinate order with a hard memory
/// bound and no temporary files.
#[derive(Debug, Parser)]
#[command(
    name = "sort",
    about = "Sort a BAM/SAM file by genomic coordinate",
    long_about = r#"
Sort a BAM or SAM file into genomic coordinate order.

Records are ordered by reference sequence (header order), then alignment
start, then strand (forward before reverse); unmapped records sort last.
Ties keep their input order, so repeated sorts are deterministic.

Instead of spilling sorted chunks to disk, the sorter keeps only a 12-byte
key per record in memory and re-reads the input once per output batch. The
memory budget caps the decoded record batch; a smaller budget means more
read passes over the same input, never a wrong result.

EXAMPLES:

  # Sort for IGV or variant calling
  bamsort sort -i aligned.bam -o sorted.bam

  # Larger batches, parallel BGZF compression
  bamsort sort -i input.bam -o sorted.bam --max-memory 4G --threads 8

  # SAM text in, SAM text out, skipping unparseable lines
  bamsort sort -i input.sam -o sorted.sam --ignore-sam-errors
"#
)]
pub struct Sort {
    /// Input BAM or SAM file (format detected from the extension).
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file; same format as the input.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Memory budget for the record batch held during reordering.
    ///
    /// Accepts values like "512M", "1G", "2G". A smaller budget lowers
    /// peak memory and increases the number of read passes over the input.
    #[arg(short = 'm', long = "max-memory", default_value = "768M", value_parser = parse_memory)]
    pub max_memory: usize,

    /// Number of threads for BGZF compression and decompression.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Compression options for output BAM.
    #[command(flatten)]
    pub compression: CompressionOptions,

    /// Skip SAM lines that fail to parse instead of aborting.
    ///
    /// Only applies to SAM input; corrupt BAM records are always fatal.
    #[arg(long = "ignore-sam-errors", default_value = "false")]
    pub ignore_sam_errors: bool,

    /// Sort by read name instead of coordinate (not implemented).
    #[arg(short = 'n', long = "by-name", default_value = "false")]
    pub by_name: bool,
}

/// Parse memory size string (e.g., "512M", "1G", "2G").
fn parse_memory(s: &str) -> Result<usize, String> {
    let s = s.trim().to_uppercase();

    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (num_str, multiplier) = if s.ends_with('G') {
        (&s[..s.len() - 1], 1024 * 1024 * 1024)
    } else if s.ends_with('M') {
        (&s[..s.len() - 1], 1024 * 1024)
    } else if s.ends_with('K') {
        (&s[..s.len() - 1], 1024)
    } else {
        // Assume bytes
        (s.as_str(), 1)
    };

    let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;

    if num < 0.0 {
        return Err("Memory size must be positive".to_string());
    }

    Ok((num * multiplier as f64) as usize)
}

impl Command for Sort {
    fn execute(&self, command_line: &str) -> Result<()> {
        if self.by_name {
            bail!("--by-name sorting is not implemented; only coordinate sort is supported");
        }
        validate_positive(self.max_memory, "max-memory")?;
        validate_positive(self.threads, "threads")?;
        if is_stdin_path(&self.input) {
            bail!("reading from stdin is not supported: the input is re-read once per batch");
        }
        validate_file_exists(&self.input, "Input")?;

        let timer = OperationTimer::new("Sorting by coordinate");

        info!("Starting Sort");
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        info!("Max memory: {} MB", self.max_memory / (1024 * 1024));
        info!("Threads: {}", self.threads);
        info!("Compression level: {}", self.compression.compression_level);
        if self.ignore_sam_errors {
            info!("Malformed SAM lines will be skipped");
        }

        let stats = CoordinateSorter::new()
            .memory_limit(self.max_memory)
            .threads(self.threads)
            .compression_level(self.compression.compression_level)
            .ignore_sam_errors(self.ignore_sam_errors)
            .pg_info(crate::version::VERSION.to_string(), command_line.to_string())
            .sort(&self.input, &self.output)?;

        info!("=== Summary ===");
        info!("Records written: {}", stats.total_records);
        if stats.skipped_records > 0 {
            info!("Malformed lines skipped: {}", stats.skipped_records);
        }
        info!("Read passes over input: {}", stats.batches.max(1));
        info!("Output: {}", self.output.display());

        timer.log_completion(stats.total_records);
        Ok(())
    }
}
