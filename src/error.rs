// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{DecodeError, EncodeError},
    Checksum, CompressionType,
};

/// Represents errors that can occur while reading or writing sorted tables.
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// The data read back does not form a structurally valid table
    ///
    /// This covers malformed footers, out-of-bounds offsets, bad magic bytes
    /// and any other structural invariant violation that a checksum mismatch
    /// would not catch on its own.
    Corruption(String),

    /// Decompression failed for the given codec
    Decompress(CompressionType),

    /// A block or region's checksum did not match the stored value
    ChecksumMismatch {
        /// The checksum stored alongside the data
        expected: Checksum,
        /// The checksum recomputed over the data that was actually read
        got: Checksum,
    },

    /// The operation raced with a concurrent mutation and should be retried
    ///
    /// Surfaced by point lookups that observe a table being swapped out from
    /// under them (e.g. during compaction) between opening the descriptor and
    /// reading a block.
    Retry,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Corruption(msg) => write!(f, "corrupt table: {msg}"),
            Self::Decompress(c) => write!(f, "decompression failed ({c:?})"),
            Self::ChecksumMismatch { expected, got } => {
                write!(f, "checksum mismatch: expected {expected}, got {got}")
            }
            Self::Retry => write!(f, "operation raced with a concurrent mutation, retry"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Sorted-table result
pub type Result<T> = std::result::Result<T, Error>;
