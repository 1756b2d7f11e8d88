//! Key extraction pass.
//!
//! Streams the source once and produces one [`SortKey`] per record, in
//! source order. Records are decoded into a single reusable buffer and
//! dropped immediately; only the 12-byte keys are retained.

use anyhow::Result;
use log::warn;
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::io;

use crate::bam_io::{AlignmentFormat, AlignmentReader};
use crate::errors::SortError;
use crate::sort::keys::{SortContext, SortKey};

/// Initial key vector capacity; grows geometrically beyond this.
const INITIAL_KEY_CAPACITY: usize = 1 << 20;

/// Output of the extraction pass.
#[derive(Debug)]
pub struct ExtractResult {
    /// One key per valid record, `original_index` ascending.
    pub keys: Vec<SortKey>,
    /// Total bytes consumed by the reader across all records; feeds the
    /// mean-record-size estimate for batch sizing.
    pub total_bytes: u64,
    /// Malformed SAM lines skipped (only nonzero with skipping enabled).
    pub skipped: u64,
}

/// Stream every record of `reader`, validate it, and collect its sort key.
///
/// # Errors
/// Fails on decode errors (unless a malformed SAM line is skippable via
/// `ignore_sam_errors`), on reference ids outside the header, and on
/// truncated input.
pub fn extract_keys(
    reader: &mut AlignmentReader,
    header: &Header,
    context: &SortContext,
    ignore_sam_errors: bool,
) -> Result<ExtractResult> {
    let mut keys: Vec<SortKey> = Vec::with_capacity(INITIAL_KEY_CAPACITY);
    let mut record = RecordBuf::default();
    let mut total_bytes: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        let ordinal = keys.len() as u64;
        let bytes =
            read_valid_record(reader, header, &mut record, ordinal, ignore_sam_errors, &mut skipped)
                .map_err(|e| annotate_eof(e, ordinal))?;
        if bytes == 0 {
            break;
        }

        validate_reference_ids(&record, context, ordinal)?;

        if keys.len() == u32::MAX as usize {
            return Err(SortError::InvalidParameter {
                parameter: "input".to_string(),
                reason: format!("more than {} records", u32::MAX),
            }
            .into());
        }

        keys.push(context.key_for(ordinal as u32, &record));
        total_bytes += bytes as u64;
    }

    Ok(ExtractResult { keys, total_bytes, skipped })
}

/// Read the next decodable record, returning the bytes consumed (0 at EOF).
///
/// With `ignore_sam_errors` set and a SAM source, a line that fails to
/// decode is skipped with a warning and reading continues; the skipped line
/// never receives an ordinal, so the extraction and rescan passes agree on
/// record numbering. BAM decode errors are always fatal.
pub(crate) fn read_valid_record(
    reader: &mut AlignmentReader,
    header: &Header,
    record: &mut RecordBuf,
    ordinal: u64,
    ignore_sam_errors: bool,
    skipped: &mut u64,
) -> Result<usize> {
    loop {
        match reader.read_record_buf(header, record) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                if ignore_sam_errors && reader.format() == AlignmentFormat::Sam {
                    warn!("Skipping malformed SAM line: {e}");
                    *skipped += 1;
                    continue;
                }
                return Err(SortError::MalformedRecord { ordinal, reason: e.to_string() }.into());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Check the reference and mate reference ids against the header.
pub(crate) fn validate_reference_ids(
    record: &RecordBuf,
    context: &SortContext,
    ordinal: u64,
) -> Result<(), SortError> {
    for id in [record.reference_sequence_id(), record.mate_reference_sequence_id()]
        .into_iter()
        .flatten()
    {
        if id as u32 >= context.reference_count {
            return Err(SortError::ReferenceOutOfRange {
                reference_id: id,
                reference_count: context.reference_count,
                ordinal,
            });
        }
    }
    Ok(())
}

/// Map an unexpected EOF mid-record onto the truncation error, keeping the
/// count of records read so far.
fn annotate_eof(error: anyhow::Error, records_read: u64) -> anyhow::Error {
    match error.downcast_ref::<io::Error>() {
        Some(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            SortError::TruncatedInput { expected: records_read + 1, actual: records_read }.into()
        }
        _ => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bam_io::{create_alignment_writer, open_alignment_reader};
    use bstr::BString;
    use noodles::core::Position;
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::header::record::value::{Map, map::ReferenceSequence};
    use std::io::Write;
    use std::num::NonZeroUsize;
    use tempfile::TempDir;

    fn test_header() -> Header {
        Header::builder()
            .add_reference_sequence(
                BString::from("chr1"),
                Map::<ReferenceSequence>::new(NonZeroUsize::new(10_000).unwrap()),
            )
            .add_reference_sequence(
                BString::from("chr2"),
                Map::<ReferenceSequence>::new(NonZeroUsize::new(10_000).unwrap()),
            )
            .build()
    }

    fn make_record(name: &str, tid: Option<usize>, start: Option<usize>, reverse: bool) -> RecordBuf {
        let mut rec = RecordBuf::default();
        *rec.name_mut() = Some(BString::from(name));
        let mut flags = Flags::empty();
        if reverse {
            flags |= Flags::REVERSE_COMPLEMENTED;
        }
        if tid.is_none() {
            flags |= Flags::UNMAPPED;
        }
        *rec.flags_mut() = flags;
        if let Some(id) = tid {
            *rec.reference_sequence_id_mut() = Some(id);
        }
        if let Some(pos) = start {
            *rec.alignment_start_mut() = Some(Position::try_from(pos).unwrap());
        }
        rec
    }

    fn write_bam(path: &std::path::Path, header: &Header, records: &[RecordBuf]) {
        let mut writer = create_alignment_writer(path, header, 1, 1).unwrap();
        for record in records {
            writer.write_record(header, record).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_keys_basic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.bam");
        let header = test_header();
        write_bam(
            &path,
            &header,
            &[
                make_record("a", Some(1), Some(200), false),
                make_record("b", Some(0), Some(100), true),
                make_record("c", None, None, false),
            ],
        );

        let (mut reader, header) = open_alignment_reader(&path, 1).unwrap();
        let context = SortContext::from_header(&header);
        let result = extract_keys(&mut reader, &header, &context, false).unwrap();

        assert_eq!(result.keys.len(), 3);
        assert_eq!(result.skipped, 0);
        assert!(result.total_bytes > 0);

        assert_eq!(result.keys[0].original_index, 0);
        assert_eq!(result.keys[0].chromosome_id, 1);
        assert_eq!(result.keys[0].composite_position, 200 << 1);

        assert_eq!(result.keys[1].chromosome_id, 0);
        assert_eq!(result.keys[1].composite_position, (100 << 1) | 1);

        // Unmapped keys to the sentinel chromosome.
        assert_eq!(result.keys[2].chromosome_id, 2);
        assert_eq!(result.keys[2].composite_position, 0);
    }

    #[test]
    fn test_extract_keys_empty_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bam");
        let header = test_header();
        write_bam(&path, &header, &[]);

        let (mut reader, header) = open_alignment_reader(&path, 1).unwrap();
        let context = SortContext::from_header(&header);
        let result = extract_keys(&mut reader, &header, &context, false).unwrap();
        assert!(result.keys.is_empty());
        assert_eq!(result.total_bytes, 0);
    }

    #[test]
    fn test_extract_keys_truncated_bam() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trunc.bam");
        let header = test_header();
        let records: Vec<RecordBuf> =
            (0..200).map(|i| make_record(&format!("r{i}"), Some(0), Some(i + 1), false)).collect();
        write_bam(&path, &header, &records);

        // Chop the tail off, removing the BGZF EOF block and part of a block.
        let bytes = std::fs::read(&path).unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&bytes[..bytes.len() - 100]).unwrap();
        drop(file);

        let result = open_alignment_reader(&path, 1)
            .and_then(|(mut reader, header)| {
                let context = SortContext::from_header(&header);
                extract_keys(&mut reader, &header, &context, false)
            });
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_sam_line_is_fatal_by_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.sam");
        std::fs::write(
            &path,
            "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:10000\nok\t0\tchr1\t5\t0\t*\t*\t0\t0\t*\t*\nthis is not a sam line\n",
        )
        .unwrap();

        let (mut reader, header) = open_alignment_reader(&path, 1).unwrap();
        let context = SortContext::from_header(&header);
        let err = extract_keys(&mut reader, &header, &context, false).unwrap_err();
        assert!(err.to_string().contains("Malformed record"));
    }

    #[test]
    fn test_malformed_sam_line_skipped_when_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.sam");
        std::fs::write(
            &path,
            "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:10000\n\
             ok\t0\tchr1\t5\t0\t*\t*\t0\t0\t*\t*\n\
             this is not a sam line\n\
             ok2\t0\tchr1\t9\t0\t*\t*\t0\t0\t*\t*\n",
        )
        .unwrap();

        let (mut reader, header) = open_alignment_reader(&path, 1).unwrap();
        let context = SortContext::from_header(&header);
        let result = extract_keys(&mut reader, &header, &context, true).unwrap();
        assert_eq!(result.keys.len(), 2);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn test_validate_reference_ids() {
        let context = SortContext::new(2);
        let ok = make_record("a", Some(1), Some(5), false);
        assert!(validate_reference_ids(&ok, &context, 0).is_ok());

        let bad = make_record("b", Some(2), Some(5), false);
        let err = validate_reference_ids(&bad, &context, 3).unwrap_err();
        assert!(err.to_string().contains("sequence id 2"));
    }
}
