// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{checksum::Checksum, compression::CompressionType, format_version::FormatVersion};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Magic bytes at the very end of every table file, right after the
/// version byte.
pub const MAGIC_BYTES: [u8; 4] = [b'S', b'T', b'B', b'L'];

/// A region's byte range within the file.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Region {
    pub offset: u64,
    pub len: u64,
}

/// Fixed-size trailer at the end of a table file, describing the offsets
/// and lengths of every region plus table-wide metadata.
#[derive(Clone, Debug)]
pub struct Footer {
    pub block_index: Region,
    pub hash_index: Region,
    pub surf: Region,
    pub old_blocks: Region,

    /// If non-zero, every entry in this table shares this version and no
    /// per-entry version is stored in blocks.
    pub global_ts: u64,

    pub compression: CompressionType,
    pub format_version: FormatVersion,
    pub checksum: Checksum,
}

impl Footer {
    /// Encoded size of the footer itself (not including the regions it
    /// describes).
    pub const ENCODED_LEN: usize = (8 + 8) * 4 // 4 regions
        + 8  // global_ts
        + 1  // compression
        + 8  // checksum
        + 1  // format version
        + 4; // magic

    pub fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        for region in [
            &self.block_index,
            &self.hash_index,
            &self.surf,
            &self.old_blocks,
        ] {
            writer.write_u64::<LittleEndian>(region.offset)?;
            writer.write_u64::<LittleEndian>(region.len)?;
        }

        writer.write_u64::<LittleEndian>(self.global_ts)?;
        writer.write_u8(self.compression.into())?;
        writer.write_u64::<LittleEndian>(self.checksum.into_u64())?;
        writer.write_u8(self.format_version.into())?;
        writer.write_all(&MAGIC_BYTES)?;

        Ok(())
    }

    pub fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut read_region = |r: &mut R| -> crate::Result<Region> {
            Ok(Region {
                offset: r.read_u64::<LittleEndian>()?,
                len: r.read_u64::<LittleEndian>()?,
            })
        };

        let block_index = read_region(reader)?;
        let hash_index = read_region(reader)?;
        let surf = read_region(reader)?;
        let old_blocks = read_region(reader)?;

        let global_ts = reader.read_u64::<LittleEndian>()?;

        let compression_tag = reader.read_u8()?;
        let compression = CompressionType::try_from(compression_tag)
            .map_err(|()| crate::Error::Corruption(format!("unknown compression tag {compression_tag}")))?;

        let checksum = Checksum::from_raw(reader.read_u64::<LittleEndian>()?);

        let version_tag = reader.read_u8()?;
        let format_version = FormatVersion::try_from(version_tag)
            .map_err(|()| crate::Error::Corruption(format!("unknown format version {version_tag}")))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_BYTES {
            return Err(crate::Error::Corruption("bad table magic bytes".into()));
        }

        Ok(Self {
            block_index,
            hash_index,
            surf,
            old_blocks,
            global_ts,
            compression,
            format_version,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn footer_roundtrip() -> crate::Result<()> {
        let footer = Footer {
            block_index: Region { offset: 10, len: 20 },
            hash_index: Region { offset: 30, len: 5 },
            surf: Region { offset: 35, len: 0 },
            old_blocks: Region { offset: 0, len: 10 },
            global_ts: 0,
            compression: CompressionType::None,
            format_version: FormatVersion::V1,
            checksum: Checksum::from_bytes(b"hello"),
        };

        let mut buf = Vec::new();
        footer.encode_into(&mut buf)?;
        assert_eq!(buf.len(), Footer::ENCODED_LEN);

        let decoded = Footer::decode_from(&mut std::io::Cursor::new(&buf))?;
        assert_eq!(decoded.block_index, footer.block_index);
        assert_eq!(decoded.global_ts, footer.global_ts);
        assert_eq!(decoded.checksum, footer.checksum);

        Ok(())
    }

    #[test]
    fn bad_magic_is_rejected() -> crate::Result<()> {
        let footer = Footer {
            block_index: Region::default(),
            hash_index: Region::default(),
            surf: Region::default(),
            old_blocks: Region::default(),
            global_ts: 0,
            compression: CompressionType::None,
            format_version: FormatVersion::V1,
            checksum: Checksum::from_bytes(b""),
        };

        let mut buf = Vec::new();
        footer.encode_into(&mut buf)?;
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;

        assert!(Footer::decode_from(&mut std::io::Cursor::new(&buf)).is_err());

        Ok(())
    }
}
