//! Chunked reorder engine.
//!
//! Given the sorted key array, emits records in sorted order while holding
//! at most one batch of decoded records in memory. Each batch re-reads the
//! source from the beginning: records belonging to the batch are captured
//! into their output slot, everything else is decoded into a scratch record
//! and discarded. The source is read `ceil(n / batch_size)` times.

use anyhow::Result;
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::path::Path;

use crate::bam_io::{AlignmentWriter, open_alignment_reader};
use crate::errors::SortError;
use crate::sort::extract::{read_valid_record, validate_reference_ids};
use crate::sort::keys::{SortContext, SortKey};

/// Stream the source once per batch and write records in key order.
///
/// `sorted_keys` must already be in coordinate order; `header` is the
/// rewritten output header (its reference sequences match the source).
/// Returns the number of records written.
///
/// # Errors
/// Fails if the source cannot be reopened, yields fewer than
/// `sorted_keys.len()` records (truncation), or contains invalid records.
#[allow(clippy::too_many_arguments)]
pub fn reorder_records(
    input: &Path,
    header: &Header,
    context: &SortContext,
    sorted_keys: &[SortKey],
    batch_size: usize,
    threads: usize,
    ignore_sam_errors: bool,
    writer: &mut AlignmentWriter,
) -> Result<u64> {
    assert!(batch_size > 0, "batch size must be nonzero");

    let n = sorted_keys.len();
    // slot + 1 per member of the current batch; 0 marks a non-member.
    let mut membership = vec![0u32; n];
    let mut buffer: Vec<RecordBuf> = Vec::new();
    let mut scratch = RecordBuf::default();

    let mut emitted = 0usize;
    while emitted < n {
        let batch = batch_size.min(n - emitted);

        membership.fill(0);
        for (slot, key) in sorted_keys[emitted..emitted + batch].iter().enumerate() {
            membership[key.original_index as usize] = slot as u32 + 1;
        }

        buffer.resize_with(batch, RecordBuf::default);

        // Full rescan: reopening re-reads and discards the header.
        let (mut reader, _) = open_alignment_reader(input, threads)?;
        let mut skipped = 0u64;
        for ordinal in 0..n {
            let slot = membership[ordinal];
            let target =
                if slot == 0 { &mut scratch } else { &mut buffer[slot as usize - 1] };
            let bytes = read_valid_record(
                &mut reader,
                header,
                target,
                ordinal as u64,
                ignore_sam_errors,
                &mut skipped,
            )?;
            if bytes == 0 {
                return Err(SortError::TruncatedInput {
                    expected: n as u64,
                    actual: ordinal as u64,
                }
                .into());
            }
            validate_reference_ids(target, context, ordinal as u64)?;
        }

        for key in &sorted_keys[emitted..emitted + batch] {
            let slot = membership[key.original_index as usize] as usize - 1;
            writer.write_record(header, &buffer[slot])?;
        }

        emitted += batch;
    }

    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bam_io::{create_alignment_writer, open_alignment_reader};
    use crate::sort::extract::extract_keys;
    use crate::sort::radix::radix_sort_keys;
    use bstr::BString;
    use noodles::core::Position;
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::header::record::value::{Map, map::ReferenceSequence};
    use std::num::NonZeroUsize;
    use tempfile::TempDir;

    fn test_header() -> Header {
        Header::builder()
            .add_reference_sequence(
                BString::from("chr1"),
                Map::<ReferenceSequence>::new(NonZeroUsize::new(100_000).unwrap()),
            )
            .add_reference_sequence(
                BString::from("chr2"),
                Map::<ReferenceSequence>::new(NonZeroUsize::new(100_000).unwrap()),
            )
            .build()
    }

    fn make_record(name: &str, tid: usize, start: usize) -> RecordBuf {
        let mut rec = RecordBuf::default();
        *rec.name_mut() = Some(BString::from(name));
        *rec.flags_mut() = Flags::empty();
        *rec.reference_sequence_id_mut() = Some(tid);
        *rec.alignment_start_mut() = Some(Position::try_from(start).unwrap());
        rec
    }

    fn write_bam(path: &std::path::Path, header: &Header, records: &[RecordBuf]) {
        let mut writer = create_alignment_writer(path, header, 1, 1).unwrap();
        for record in records {
            writer.write_record(header, record).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_names(path: &std::path::Path) -> Vec<String> {
        let (mut reader, header) = open_alignment_reader(path, 1).unwrap();
        let mut names = Vec::new();
        let mut record = RecordBuf::default();
        while reader.read_record_buf(&header, &mut record).unwrap() > 0 {
            names.push(String::from_utf8(record.name().unwrap().to_vec()).unwrap());
        }
        names
    }

    fn sort_with_batch(batch_size: usize) -> Vec<String> {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.bam");
        let output = dir.path().join("out.bam");
        let header = test_header();

        // Shuffled input: names encode the expected output order.
        write_bam(
            &input,
            &header,
            &[
                make_record("3", 1, 50),
                make_record("0", 0, 10),
                make_record("4", 1, 500),
                make_record("1", 0, 10),
                make_record("2", 0, 999),
            ],
        );

        let (mut reader, header) = open_alignment_reader(&input, 1).unwrap();
        let context = SortContext::from_header(&header);
        let mut result = extract_keys(&mut reader, &header, &context, false).unwrap();
        drop(reader);
        radix_sort_keys(&mut result.keys, &context);

        let mut writer = create_alignment_writer(&output, &header, 1, 1).unwrap();
        let written = reorder_records(
            &input,
            &header,
            &context,
            &result.keys,
            batch_size,
            1,
            false,
            &mut writer,
        )
        .unwrap();
        writer.finish().unwrap();
        assert_eq!(written, 5);

        read_names(&output)
    }

    #[test]
    fn test_reorder_sorts_and_is_stable() {
        // Records "0" and "1" share a coordinate; input order must hold.
        let names = sort_with_batch(5);
        assert_eq!(names, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_batch_size_invariance() {
        let expected = sort_with_batch(5);
        for batch_size in [1, 2, 3, 7] {
            assert_eq!(sort_with_batch(batch_size), expected, "batch size {batch_size}");
        }
    }

    #[test]
    fn test_reorder_detects_shortened_source() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.bam");
        let header = test_header();
        write_bam(&input, &header, &[make_record("a", 0, 10), make_record("b", 0, 20)]);

        let (mut reader, header) = open_alignment_reader(&input, 1).unwrap();
        let context = SortContext::from_header(&header);
        let mut result = extract_keys(&mut reader, &header, &context, false).unwrap();
        drop(reader);
        radix_sort_keys(&mut result.keys, &context);

        // Source shrinks between passes: rewrite it with one record.
        write_bam(&input, &header, &[make_record("a", 0, 10)]);

        let output = dir.path().join("out.bam");
        let mut writer = create_alignment_writer(&output, &header, 1, 1).unwrap();
        let err = reorder_records(
            &input,
            &header,
            &context,
            &result.keys,
            10,
            1,
            false,
            &mut writer,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Truncated input"));
    }
}
