//! Alignment file I/O utilities.
//!
//! Format-aware readers and writers for BAM (BGZF-compressed) and plain SAM
//! text, with consistent error handling and header management.
//!
//! # Threading Model
//!
//! BAM files use BGZF compression, which can be parallelized for both
//! reading and writing:
//!
//! - **Single-threaded**: `threads = 1` (lower overhead, good for small files)
//! - **Multi-threaded**: `threads > 1` (higher throughput for large files)

use anyhow::{Context, Result};
use noodles::bgzf::{
    self, MultithreadedReader, MultithreadedWriter, Reader as BgzfReader, Writer as BgzfWriter,
    multithreaded_writer, writer::CompressionLevel,
};
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::num::NonZero;
use std::path::Path;

/// On-disk alignment container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    /// BGZF-compressed BAM.
    Bam,
    /// Plain-text SAM.
    Sam,
}

impl AlignmentFormat {
    /// Detect the format from a path's extension (".sam" means SAM text,
    /// everything else is treated as BAM).
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("sam") => Self::Sam,
            _ => Self::Bam,
        }
    }
}

/// Enum wrapping single-threaded and multi-threaded BGZF readers.
pub enum BgzfReaderEnum {
    /// Single-threaded BGZF reader (lower overhead for small files)
    SingleThreaded(BgzfReader<File>),
    /// Multi-threaded BGZF reader
    MultiThreaded(MultithreadedReader<File>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// Enum wrapping single-threaded and multi-threaded BGZF writers.
pub enum BgzfWriterEnum {
    /// Single-threaded BGZF writer
    SingleThreaded(BgzfWriter<File>),
    /// Multi-threaded BGZF writer
    MultiThreaded(MultithreadedWriter<File>),
}

impl Write for BgzfWriterEnum {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.write(buf),
            BgzfWriterEnum::MultiThreaded(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.flush(),
            BgzfWriterEnum::MultiThreaded(w) => w.flush(),
        }
    }
}

impl BgzfWriterEnum {
    /// Finish writing and close the writer properly. Multi-threaded writers
    /// must be finished explicitly so all blocks and the EOF marker land.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing the writer fails.
    pub fn finish(self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(mut w) => {
                w.flush()?;
                // Single-threaded writer writes EOF on drop
                Ok(())
            }
            BgzfWriterEnum::MultiThreaded(mut w) => {
                w.finish().map_err(|e| io::Error::other(e.to_string()))?;
                Ok(())
            }
        }
    }
}

/// Format-aware record reader over BAM or SAM input.
pub enum AlignmentReader {
    /// BAM records through BGZF decompression.
    Bam(noodles::bam::io::Reader<BgzfReaderEnum>),
    /// SAM text records.
    Sam(noodles::sam::io::Reader<BufReader<File>>),
}

impl AlignmentReader {
    /// Read the next record into `record`.
    ///
    /// Returns the number of bytes consumed, or 0 at EOF, matching the
    /// underlying noodles readers.
    ///
    /// # Errors
    /// Returns an error if the record cannot be read or decoded.
    pub fn read_record_buf(
        &mut self,
        header: &Header,
        record: &mut RecordBuf,
    ) -> io::Result<usize> {
        match self {
            AlignmentReader::Bam(reader) => reader.read_record_buf(header, record),
            AlignmentReader::Sam(reader) => reader.read_record_buf(header, record),
        }
    }

    /// The container format this reader decodes.
    #[must_use]
    pub fn format(&self) -> AlignmentFormat {
        match self {
            AlignmentReader::Bam(_) => AlignmentFormat::Bam,
            AlignmentReader::Sam(_) => AlignmentFormat::Sam,
        }
    }
}

/// Format-aware record writer over BAM or SAM output.
pub enum AlignmentWriter {
    /// BAM records through BGZF compression.
    Bam(noodles::bam::io::Writer<BgzfWriterEnum>),
    /// SAM text records.
    Sam(noodles::sam::io::Writer<BufWriter<File>>),
}

impl AlignmentWriter {
    /// Write one alignment record.
    ///
    /// # Errors
    /// Returns an error if encoding or writing the record fails.
    pub fn write_record(&mut self, header: &Header, record: &RecordBuf) -> io::Result<()> {
        match self {
            AlignmentWriter::Bam(writer) => writer.write_alignment_record(header, record),
            AlignmentWriter::Sam(writer) => writer.write_alignment_record(header, record),
        }
    }

    /// Flush buffered output and, for BAM, write the BGZF EOF marker.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing the output fails.
    pub fn finish(self) -> io::Result<()> {
        match self {
            AlignmentWriter::Bam(writer) => writer.into_inner().finish(),
            AlignmentWriter::Sam(writer) => writer.into_inner().flush(),
        }
    }
}

/// Open an alignment file and read its header.
///
/// The format is chosen by extension (see [`AlignmentFormat::from_path`]).
/// For BAM, `threads > 1` enables multi-threaded BGZF decompression.
///
/// # Errors
/// Returns an error if the file cannot be opened or the header cannot be read.
///
/// # Panics
/// Panics if `threads > 1` but `NonZero::new` fails (should not happen).
pub fn open_alignment_reader<P: AsRef<Path>>(
    path: P,
    threads: usize,
) -> Result<(AlignmentReader, Header)> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open input: {}", path_ref.display()))?;

    match AlignmentFormat::from_path(path_ref) {
        AlignmentFormat::Bam => {
            let bgzf_reader = if threads > 1 {
                let worker_count = NonZero::new(threads).expect("threads > 1 checked above");
                BgzfReaderEnum::MultiThreaded(MultithreadedReader::with_worker_count(
                    worker_count,
                    file,
                ))
            } else {
                BgzfReaderEnum::SingleThreaded(BgzfReader::new(file))
            };

            let mut reader = noodles::bam::io::Reader::from(bgzf_reader);
            let header = reader
                .read_header()
                .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;
            Ok((AlignmentReader::Bam(reader), header))
        }
        AlignmentFormat::Sam => {
            let mut reader = noodles::sam::io::Reader::new(BufReader::new(file));
            let header = reader
                .read_header()
                .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;
            Ok((AlignmentReader::Sam(reader), header))
        }
    }
}

/// Create an alignment writer and write the header in one operation.
///
/// The format is chosen by extension. For BAM, both the single-threaded and
/// multi-threaded (`threads > 1`) writers compress at the requested level;
/// an out-of-range level falls back to the writer default.
///
/// # Errors
/// Returns an error if the file cannot be created or the header cannot be
/// written.
///
/// # Panics
/// Panics if `threads > 1` but `NonZero::new` fails (should not happen).
pub fn create_alignment_writer<P: AsRef<Path>>(
    path: P,
    header: &Header,
    threads: usize,
    compression_level: u32,
) -> Result<AlignmentWriter> {
    let path_ref = path.as_ref();
    let output_file = File::create(path_ref)
        .with_context(|| format!("Failed to create output: {}", path_ref.display()))?;

    match AlignmentFormat::from_path(path_ref) {
        AlignmentFormat::Bam => {
            let bgzf_writer = if threads > 1 {
                let worker_count = NonZero::new(threads).expect("threads > 1 checked above");
                let mut builder =
                    multithreaded_writer::Builder::default().set_worker_count(worker_count);

                #[allow(clippy::cast_possible_truncation)]
                if let Some(level) = CompressionLevel::new(compression_level as u8) {
                    builder = builder.set_compression_level(level);
                }

                BgzfWriterEnum::MultiThreaded(builder.build_from_writer(output_file))
            } else {
                let mut builder = bgzf::writer::Builder::default();

                #[allow(clippy::cast_possible_truncation)]
                if let Some(level) = CompressionLevel::new(compression_level as u8) {
                    builder = builder.set_compression_level(level);
                }

                BgzfWriterEnum::SingleThreaded(builder.build_from_writer(output_file))
            };

            let mut writer = noodles::bam::io::Writer::from(bgzf_writer);
            writer
                .write_header(header)
                .with_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
            Ok(AlignmentWriter::Bam(writer))
        }
        AlignmentFormat::Sam => {
            let mut writer = noodles::sam::io::Writer::new(BufWriter::new(output_file));
            writer
                .write_header(header)
                .with_context(|| format!("Failed to write header to: {}", path_ref.display()))?;
            Ok(AlignmentWriter::Sam(writer))
        }
    }
}

/// Check if a path refers to stdin.
///
/// Returns true if the path is "-" or "/dev/stdin".
///
/// # Example
/// ```
/// use bamsort_lib::bam_io::is_stdin_path;
/// use std::path::Path;
///
/// assert!(is_stdin_path(Path::new("-")));
/// assert!(is_stdin_path(Path::new("/dev/stdin")));
/// assert!(!is_stdin_path(Path::new("input.bam")));
/// ```
pub fn is_stdin_path<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "/dev/stdin"
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;
    use noodles::sam::header::record::value::{Map, map::ReferenceSequence};
    use std::num::NonZeroUsize;
    use tempfile::TempDir;

    fn create_test_header() -> Header {
        Header::builder()
            .add_reference_sequence(
                BString::from("chr1"),
                Map::<ReferenceSequence>::new(NonZeroUsize::new(100).unwrap()),
            )
            .build()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(AlignmentFormat::from_path("input.bam"), AlignmentFormat::Bam);
        assert_eq!(AlignmentFormat::from_path("input.sam"), AlignmentFormat::Sam);
        assert_eq!(AlignmentFormat::from_path("input.SAM"), AlignmentFormat::Sam);
        assert_eq!(AlignmentFormat::from_path("input"), AlignmentFormat::Bam);
        assert_eq!(AlignmentFormat::from_path("dir.sam/input.bam"), AlignmentFormat::Bam);
    }

    #[test]
    fn test_open_reader_nonexistent_file() {
        let result = open_alignment_reader("/nonexistent/file.bam", 1);
        let err_msg = result.err().unwrap().to_string();
        assert!(err_msg.contains("Failed to open input"));
    }

    #[test]
    fn test_create_writer_invalid_path() {
        let header = create_test_header();
        let result = create_alignment_writer("/invalid/path/output.bam", &header, 1, 1);
        let err_msg = result.err().unwrap().to_string();
        assert!(err_msg.contains("Failed to create output"));
    }

    #[test]
    fn test_bam_roundtrip_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty.bam");
        let header = create_test_header();

        let writer = create_alignment_writer(&path, &header, 1, 1)?;
        writer.finish()?;

        let (mut reader, read_header) = open_alignment_reader(&path, 1)?;
        assert_eq!(read_header.reference_sequences().len(), 1);

        let mut record = RecordBuf::default();
        assert_eq!(reader.read_record_buf(&read_header, &mut record)?, 0);
        Ok(())
    }

    #[test]
    fn test_bam_roundtrip_multithreaded() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty.bam");
        let header = create_test_header();

        let writer = create_alignment_writer(&path, &header, 4, 3)?;
        writer.finish()?;

        let (mut reader, read_header) = open_alignment_reader(&path, 4)?;
        assert_eq!(read_header.reference_sequences().len(), 1);

        let mut record = RecordBuf::default();
        assert_eq!(reader.read_record_buf(&read_header, &mut record)?, 0);
        Ok(())
    }

    #[test]
    fn test_single_threaded_writer_honors_compression_level() -> Result<()> {
        use noodles::core::Position;

        let dir = TempDir::new()?;
        let header = create_test_header();

        // Level 0 emits stored blocks, so the same content must come out
        // larger than at level 9.
        let mut sizes = Vec::new();
        for level in [0u32, 9] {
            let path = dir.path().join(format!("level{level}.bam"));
            let mut writer = create_alignment_writer(&path, &header, 1, level)?;
            let mut record = RecordBuf::default();
            for i in 0..500usize {
                *record.name_mut() = Some(BString::from(format!("read{i}")));
                *record.reference_sequence_id_mut() = Some(0);
                *record.alignment_start_mut() = Some(Position::try_from(i % 90 + 1)?);
                writer.write_record(&header, &record)?;
            }
            writer.finish()?;
            sizes.push(std::fs::metadata(&path)?.len());
        }
        assert!(sizes[0] > sizes[1], "stored {} <= deflated {}", sizes[0], sizes[1]);
        Ok(())
    }

    #[test]
    fn test_sam_roundtrip_with_record() -> Result<()> {
        use noodles::core::Position;

        let dir = TempDir::new()?;
        let path = dir.path().join("one.sam");
        let header = create_test_header();

        let mut record = RecordBuf::default();
        *record.name_mut() = Some(BString::from("read1"));
        *record.reference_sequence_id_mut() = Some(0);
        *record.alignment_start_mut() = Some(Position::try_from(10)?);

        let mut writer = create_alignment_writer(&path, &header, 1, 1)?;
        writer.write_record(&header, &record)?;
        writer.finish()?;

        let (mut reader, read_header) = open_alignment_reader(&path, 1)?;
        assert_eq!(reader.format(), AlignmentFormat::Sam);

        let mut read_back = RecordBuf::default();
        assert!(reader.read_record_buf(&read_header, &mut read_back)? > 0);
        assert_eq!(read_back.name().map(|n| n.to_vec()), Some(b"read1".to_vec()));
        assert_eq!(reader.read_record_buf(&read_header, &mut read_back)?, 0);
        Ok(())
    }

    #[test]
    fn test_is_stdin_path() {
        assert!(is_stdin_path("-"));
        assert!(is_stdin_path("/dev/stdin"));
        assert!(!is_stdin_path("input.bam"));
        assert!(!is_stdin_path(""));
        assert!(!is_stdin_path("/dev/null"));
    }
}
