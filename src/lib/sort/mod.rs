//! Memory-bounded coordinate sorting.
//!
//! A sort-by-indirection design: one streaming pass collects a 12-byte key
//! per record, an in-memory LSD radix sort orders the keys, and a chunked
//! reorder pass re-reads the source once per output batch to materialize
//! records in sorted order. No temporary files are used, and peak memory is
//! the key array plus one batch of decoded records.

pub mod extract;
pub mod keys;
pub mod pipeline;
pub mod radix;
pub mod reorder;

pub use extract::{ExtractResult, extract_keys};
pub use keys::{SortContext, SortKey};
pub use pipeline::{CoordinateSorter, SortStats};
pub use radix::radix_sort_keys;
pub use reorder::reorder_records;
