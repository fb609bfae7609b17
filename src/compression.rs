// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Error;

/// Compression codec applied to data blocks (and, optionally, the hash
/// index / SuRF regions) before they are written to a table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompressionType {
    /// No compression
    None,

    /// LZ4 compression
    #[cfg(feature = "lz4")]
    Lz4,

    /// Zstd compression
    #[cfg(feature = "zstd")]
    Zstd,
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            #[cfg(feature = "lz4")]
            Self::Lz4 => write!(f, "lz4"),
            #[cfg(feature = "zstd")]
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<CompressionType> for u8 {
    fn from(value: CompressionType) -> Self {
        match value {
            CompressionType::None => 0,
            #[cfg(feature = "lz4")]
            CompressionType::Lz4 => 1,
            #[cfg(feature = "zstd")]
            CompressionType::Zstd => 2,
        }
    }
}

impl TryFrom<u8> for CompressionType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            #[cfg(feature = "lz4")]
            1 => Ok(Self::Lz4),
            #[cfg(feature = "zstd")]
            2 => Ok(Self::Zstd),
            _ => Err(()),
        }
    }
}

impl CompressionType {
    pub fn compress(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        match self {
            Self::None => Ok(bytes.to_vec()),

            #[cfg(feature = "lz4")]
            Self::Lz4 => Ok(lz4_flex::compress_prepend_size(bytes)),

            #[cfg(feature = "zstd")]
            Self::Zstd => zstd::bulk::compress(bytes, 3).map_err(Error::Io),
        }
    }

    pub fn decompress(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        match self {
            Self::None => Ok(bytes.to_vec()),

            #[cfg(feature = "lz4")]
            Self::Lz4 => lz4_flex::decompress_size_prepended(bytes)
                .map_err(|_| Error::Decompress(*self)),

            #[cfg(feature = "zstd")]
            Self::Zstd => {
                // Blocks are bounded (see `crate::config::Config::block_size`),
                // so a generous fixed upper bound is safe and avoids having
                // to store the decompressed length out of band.
                zstd::bulk::decompress(bytes, 16 * 1_024 * 1_024)
                    .map_err(|_| Error::Decompress(*self))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn none_roundtrip() -> crate::Result<()> {
        let data = b"hello world";
        let compressed = CompressionType::None.compress(data)?;
        let decompressed = CompressionType::None.decompress(&compressed)?;
        assert_eq!(data.as_slice(), decompressed);
        Ok(())
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn lz4_roundtrip() -> crate::Result<()> {
        let data = b"hello world hello world hello world".repeat(10);
        let compressed = CompressionType::Lz4.compress(&data)?;
        let decompressed = CompressionType::Lz4.decompress(&compressed)?;
        assert_eq!(data, decompressed);
        Ok(())
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_roundtrip() -> crate::Result<()> {
        let data = b"hello world hello world hello world".repeat(10);
        let compressed = CompressionType::Zstd.compress(&data)?;
        let decompressed = CompressionType::Zstd.decompress(&compressed)?;
        assert_eq!(data, decompressed);
        Ok(())
    }
}
