use std::string::FromUtf8Error;

use prio::vdaf::VdafError;

use crate::NONCE_SIZE;

/// Errors returned by the codec, the search driver and the aggregation backends.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested bit width cannot be represented by a [`Codec`](crate::Codec).
    #[error("unsupported bit width {0}: must be between 1 and 128")]
    UnsupportedWidth(u16),

    /// The payload plus the sentinel bit does not fit in the bit width.
    #[error("{len}-byte payload does not fit in {bits} bits")]
    EncodingOverflow { len: usize, bits: u16 },

    /// The value was not produced by [`Codec::encode`](crate::Codec::encode).
    #[error("malformed encoding: {0}")]
    MalformedEncoding(&'static str),

    /// A decoded error report is missing some of its fixed fields.
    #[error("error report payload too short: {0} bytes")]
    TruncatedRecord(usize),

    /// The origin of a decoded error report is not valid UTF-8.
    #[error("error report origin is not valid UTF-8")]
    InvalidOrigin(#[from] FromUtf8Error),

    /// A candidate prefix has more bits than its level allows.
    #[error("prefix {prefix:#x} does not fit at level {level}")]
    PrefixOutOfRange { prefix: u128, level: usize },

    /// A tree level lies outside of the bit width.
    #[error("level {level} is out of range for {bits}-bit values")]
    LevelOutOfRange { level: usize, bits: u16 },

    /// The aggregator answered with a different number of counts than prefixes submitted.
    #[error("aggregator returned {got} counts for {expected} prefixes")]
    AggregationMismatch { expected: usize, got: usize },

    /// The aggregation parameter repeats or precedes a level that was already aggregated.
    #[error("level {0} was already aggregated")]
    LevelReused(usize),

    /// The prefixes of a level do not all extend a prefix of the previously aggregated level.
    #[error("prefixes at level {level} do not extend the previously aggregated prefixes")]
    PrefixNotExtension { level: usize },

    /// Two reports in the same batch carry the same nonce.
    #[error("nonce {0:02x?} appears more than once")]
    DuplicateNonce([u8; NONCE_SIZE]),

    /// A nonce that was already sharded came back with a different measurement.
    #[error("nonce {0:02x?} was already used for a different measurement")]
    NonceConflict([u8; NONCE_SIZE]),

    /// Failure inside the VDAF.
    #[error("vdaf error: {0}")]
    Vdaf(#[from] VdafError),
}
