//! Sort key types for coordinate sorting.
//!
//! Keys are extracted once per record during the first pass over the source,
//! sorted in memory, and then drive the chunked reorder pass. A key carries
//! the record's ordinal in the source, so records are never held in memory
//! during sorting.

use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;

/// Fixed-size sort key for one record.
///
/// Ordering is `(chromosome_id, composite_position)` ascending, with ties
/// broken by `original_index` (stability). 12 bytes per record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortKey {
    /// 0-based ordinal of the record in the source file.
    pub original_index: u32,
    /// Reference sequence index, or the reference count for unmapped records
    /// so they sort after every chromosome.
    pub chromosome_id: u32,
    /// `(offset + 1) << 1 | strand`, where `offset` is the 0-based leftmost
    /// alignment offset and `strand` is 1 for reverse. Unmapped records use
    /// offset slot 0, so their composite position is just the strand bit.
    pub composite_position: u32,
}

impl SortKey {
    /// The `(chromosome, position)` pair that defines the coordinate order.
    #[inline]
    #[must_use]
    pub fn coordinate(&self) -> (u32, u32) {
        (self.chromosome_id, self.composite_position)
    }
}

/// Header-derived context for key extraction.
#[derive(Debug, Clone)]
pub struct SortContext {
    /// Number of reference sequences; unmapped records key to this value.
    pub reference_count: u32,
}

impl SortContext {
    /// Create a sort context from a header.
    #[must_use]
    pub fn from_header(header: &Header) -> Self {
        Self { reference_count: header.reference_sequences().len() as u32 }
    }

    /// Create a context with an explicit reference count (for testing).
    #[must_use]
    pub fn new(reference_count: u32) -> Self {
        Self { reference_count }
    }

    /// Extract the sort key for a record at the given source ordinal.
    ///
    /// A mapped record's 1-based alignment start equals its 0-based offset
    /// plus one, so the start feeds the composite position directly; the
    /// zero slot is left for records without a start.
    #[must_use]
    pub fn key_for(&self, original_index: u32, record: &RecordBuf) -> SortKey {
        let strand = u32::from(record.flags().is_reverse_complemented());
        let offset_plus_one =
            record.alignment_start().map_or(0, |start| usize::from(start) as u32);
        let chromosome_id = record
            .reference_sequence_id()
            .map_or(self.reference_count, |id| id as u32);

        SortKey {
            original_index,
            chromosome_id,
            composite_position: (offset_plus_one << 1) | strand,
        }
    }
}
