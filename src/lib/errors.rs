//! Custom error types for bamsort operations.

use thiserror::Error;

/// Result type alias for bamsort operations
pub type Result<T> = std::result::Result<T, SortError>;

/// Error type for bamsort operations
#[derive(Error, Debug)]
pub enum SortError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BAM", "SAM")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Input ended before all indexed records could be re-read
    #[error("Truncated input: expected {expected} records, got {actual}")]
    TruncatedInput {
        /// Record count observed during key extraction
        expected: u64,
        /// Records successfully read before EOF
        actual: u64,
    },

    /// A record could not be decoded
    #[error("Malformed record at ordinal {ordinal}: {reason}")]
    MalformedRecord {
        /// 0-based ordinal of the record in the source
        ordinal: u64,
        /// Decoder error message
        reason: String,
    },

    /// A record references a sequence id outside the header's @SQ lines
    #[error(
        "Record {ordinal} references sequence id {reference_id} \
         but the header declares only {reference_count} sequences"
    )]
    ReferenceOutOfRange {
        /// The out-of-range reference sequence id
        reference_id: usize,
        /// Number of reference sequences in the header
        reference_count: u32,
        /// 0-based ordinal of the offending record
        ordinal: u64,
    },
}
