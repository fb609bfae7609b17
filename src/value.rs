// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    key::InternalKey,
    Slice,
};
use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// User defined key
pub type UserKey = Slice;

/// User defined data (blob of bytes)
#[allow(clippy::module_name_repetitions)]
pub type UserValue = Slice;

/// Version number - a monotonically increasing counter.
///
/// A value with a higher version shadows an item with the same user key
/// and a lower version. This enables MVCC: within a user key, versions
/// sort newest-first.
pub type SeqNo = u64;

/// Value type (regular value or tombstone)
///
/// Cached alongside [`InternalKey`] for convenience; the authoritative bits
/// for on-disk decoding live in [`ValueStruct::meta`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub enum ValueType {
    /// Existing value
    Value,

    /// Deleted value
    Tombstone,

    /// "Weak" deletion (a.k.a. `SingleDelete` in `RocksDB`): discards only
    /// the version directly beneath it, not the whole key history.
    WeakTombstone,
}

impl TryFrom<u8> for ValueType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Value),
            1 => Ok(Self::Tombstone),
            2 => Ok(Self::WeakTombstone),
            _ => Err(()),
        }
    }
}

impl From<ValueType> for u8 {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::Value => 0,
            ValueType::Tombstone => 1,
            ValueType::WeakTombstone => 2,
        }
    }
}

/// Bit in [`ValueStruct::meta`]: the record is a deletion tombstone.
pub const META_DELETE: u8 = 1 << 0;

/// Bit in [`ValueStruct::meta`]: `value` is a value-pointer handle into an
/// out-of-scope value log rather than the literal payload bytes.
pub const META_VALUE_POINTER: u8 = 1 << 1;

/// Bit in [`ValueStruct::meta`]: a weak ("single") delete; discard only the
/// next-older version of this key, not its whole history.
pub const META_DISCARD_EARLIER_VERSIONS: u8 = 1 << 2;

/// The on-disk value record: `{ meta, user_meta, expires_at, value }`.
///
/// Wire format: `meta:u8 | user_meta_len:u8 | user_meta[..] | expires_at:varint | value[..]`.
/// `expires_at == 0` means no expiry. `value` is either the literal payload or,
/// when [`META_VALUE_POINTER`] is set, an encoded value-pointer handle meant
/// to be resolved by a [`crate::iter::ValueResolver`].
#[derive(Clone, Eq, PartialEq)]
pub struct ValueStruct {
    /// Bitflags: see [`META_DELETE`], [`META_VALUE_POINTER`], [`META_DISCARD_EARLIER_VERSIONS`].
    pub meta: u8,

    /// Small user-supplied metadata blob (at most 255 bytes).
    pub user_meta: Slice,

    /// Unix timestamp (seconds) after which this value is considered expired, or 0.
    pub expires_at: u64,

    /// Payload bytes, or an encoded value-pointer handle.
    pub value: UserValue,
}

impl ValueStruct {
    #[must_use]
    pub fn new(value: UserValue) -> Self {
        Self {
            meta: 0,
            user_meta: Slice::new(&[]),
            expires_at: 0,
            value,
        }
    }

    #[must_use]
    pub fn tombstone() -> Self {
        Self {
            meta: META_DELETE,
            user_meta: Slice::new(&[]),
            expires_at: 0,
            value: Slice::new(&[]),
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.meta & META_DELETE != 0
    }

    #[must_use]
    pub fn is_value_pointer(&self) -> bool {
        self.meta & META_VALUE_POINTER != 0
    }

    #[must_use]
    pub fn discards_earlier_versions(&self) -> bool {
        self.meta & META_DISCARD_EARLIER_VERSIONS != 0
    }

    fn size(&self) -> usize {
        1 + 1 + self.user_meta.len() + 10 /* expires_at varint upper bound */ + self.value.len()
    }
}

impl Encode for ValueStruct {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u8(self.meta)?;

        assert!(
            self.user_meta.len() <= u8::MAX.into(),
            "user_meta can be at most 255 bytes"
        );
        #[allow(clippy::cast_possible_truncation)]
        writer.write_u8(self.user_meta.len() as u8)?;
        writer.write_all(&self.user_meta)?;

        writer.write_u64_varint(self.expires_at)?;
        writer.write_all(&self.value)?;

        Ok(())
    }
}

impl ValueStruct {
    /// Decodes a value record, given the already-known length of the
    /// enclosing framing (the caller slices `reader` to exactly this many
    /// bytes beforehand, since `value` otherwise runs to end-of-record).
    pub fn decode_from<R: Read>(reader: &mut R, remaining_len: usize) -> Result<Self, DecodeError> {
        let meta = reader.read_u8()?;
        let user_meta_len = reader.read_u8()?;

        let mut user_meta = vec![0; user_meta_len.into()];
        reader.read_exact(&mut user_meta)?;

        let expires_at = reader.read_u64_varint()?;

        let header_len = 1 + 1 + usize::from(user_meta_len);
        let varint_len = crate::coding::varint_u64_len(expires_at);
        let value_len = remaining_len
            .checked_sub(header_len + varint_len)
            .ok_or(DecodeError::Corrupt("value record shorter than its header"))?;

        let mut value = vec![0; value_len];
        reader.read_exact(&mut value)?;

        Ok(Self {
            meta,
            user_meta: user_meta.into(),
            expires_at,
            value: value.into(),
        })
    }
}

impl std::fmt::Debug for ValueStruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ValueStruct {{ meta: {:#04b}, expires_at: {}, value: {} }}",
            self.meta,
            self.expires_at,
            if self.value.len() >= 64 {
                format!("[ ... {} bytes ]", self.value.len())
            } else {
                format!("{:?}", self.value)
            }
        )
    }
}

/// Internal representation of a KV pair: an [`InternalKey`] paired with its
/// [`ValueStruct`].
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Eq)]
pub struct InternalValue {
    /// Internal key
    pub key: InternalKey,

    /// Value record
    pub value: ValueStruct,
}

impl InternalValue {
    /// Creates a new [`InternalValue`].
    ///
    /// # Panics
    ///
    /// Panics if the key is empty or the value exceeds 2^32 bytes.
    pub fn new(key: InternalKey, value: ValueStruct) -> Self {
        assert!(!key.user_key.is_empty(), "key may not be empty");
        assert!(
            u32::try_from(value.value.len()).is_ok(),
            "values can be at most 2^32 bytes in length"
        );

        Self { key, value }
    }

    /// Creates a new value from raw components.
    pub fn from_components<K: Into<UserKey>, V: Into<UserValue>>(
        user_key: K,
        value: V,
        seqno: SeqNo,
        value_type: ValueType,
    ) -> Self {
        let key = InternalKey::new(user_key, seqno, value_type);

        let value = match value_type {
            ValueType::Value => ValueStruct::new(value.into()),
            ValueType::Tombstone => ValueStruct::tombstone(),
            ValueType::WeakTombstone => ValueStruct {
                meta: META_DELETE | META_DISCARD_EARLIER_VERSIONS,
                user_meta: Slice::new(&[]),
                expires_at: 0,
                value: Slice::new(&[]),
            },
        };

        Self::new(key, value)
    }

    /// Creates a new tombstone.
    pub fn new_tombstone<K: Into<UserKey>>(key: K, seqno: u64) -> Self {
        Self::from_components(key, Slice::new(&[]), seqno, ValueType::Tombstone)
    }

    /// Creates a new weak tombstone.
    pub fn new_weak_tombstone<K: Into<UserKey>>(key: K, seqno: u64) -> Self {
        Self::from_components(key, Slice::new(&[]), seqno, ValueType::WeakTombstone)
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_tombstone()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        std::mem::size_of::<SeqNo>() + self.key.user_key.len() + self.value.size()
    }
}

impl PartialEq for InternalValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl PartialOrd for InternalValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.key.cmp(&other.key))
    }
}

// Order by user key, THEN by version (descending) -- see InternalKey::cmp.
impl Ord for InternalValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::fmt::Debug for InternalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} => {:?}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use test_log::test;

    #[test]
    fn pik_cmp_user_key() {
        let a = InternalKey::new(*b"a", 0, ValueType::Value);
        let b = InternalKey::new(*b"b", 0, ValueType::Value);
        assert!(a < b);
    }

    #[test]
    fn pik_cmp_seqno_descending() {
        let a = InternalKey::new(*b"a", 0, ValueType::Value);
        let b = InternalKey::new(*b"a", 1, ValueType::Value);
        assert!(a > b, "higher version sorts first within the same key");
    }

    #[test]
    fn value_roundtrip_empty() -> crate::Result<()> {
        let value = ValueStruct::new(Slice::new(&[]));

        let mut buf = Vec::new();
        value.encode_into(&mut buf)?;

        let decoded = ValueStruct::decode_from(&mut Cursor::new(&buf), buf.len())?;
        assert_eq!(value, decoded);

        Ok(())
    }

    #[test]
    fn value_roundtrip_with_payload_and_expiry() -> crate::Result<()> {
        let value = ValueStruct {
            meta: 0,
            user_meta: Slice::new(b"tag"),
            expires_at: 1_732_000_000,
            value: Slice::new(b"hello world"),
        };

        let mut buf = Vec::new();
        value.encode_into(&mut buf)?;

        let decoded = ValueStruct::decode_from(&mut Cursor::new(&buf), buf.len())?;
        assert_eq!(value, decoded);

        Ok(())
    }

    #[test]
    fn tombstone_internal_value_is_empty() {
        let value = InternalValue::new_tombstone(*b"a", 5);
        assert!(value.is_tombstone());
        assert!(value.value.value.is_empty());
    }

    #[test]
    fn weak_tombstone_discards_earlier_versions() {
        let value = InternalValue::new_weak_tombstone(*b"a", 5);
        assert!(value.is_tombstone());
        assert!(value.value.discards_earlier_versions());
    }
}
