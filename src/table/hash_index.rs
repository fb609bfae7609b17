// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Outcome of probing a [`HashIndex`] slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lookup {
    /// The key definitely does not exist in this table.
    NotFound,
    /// Exactly one key hashes to this slot: `(block_idx, entry_offset_in_block)`.
    Unique(u32, u8),
    /// Two or more keys hash to this slot (or the slot overflowed `u8`);
    /// the caller must fall back to the block index / SuRF seek path.
    Collision,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Status {
    Empty,
    Unique,
    Collision,
    NotFoundSentinel,
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        match value {
            Status::Empty => 0,
            Status::Unique => 1,
            Status::Collision => 2,
            Status::NotFoundSentinel => 3,
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Empty),
            1 => Ok(Self::Unique),
            2 => Ok(Self::Collision),
            3 => Ok(Self::NotFoundSentinel),
            _ => Err(()),
        }
    }
}

#[derive(Copy, Clone)]
struct Slot {
    block_idx: u32,
    entry_offset: u8,
    status: Status,
}

/// A linear-probing, open-addressed hash table answering point-gets in
/// O(1), keyed by a 64-bit content hash of the user key (`xxh3_64`).
pub struct HashIndex {
    slots: Vec<Slot>,
}

impl HashIndex {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_for(&self, key_hash: u64) -> usize {
        #[allow(clippy::cast_possible_truncation)]
        (key_hash % self.slots.len() as u64) as usize
    }

    #[must_use]
    pub fn lookup(&self, key_hash: u64) -> Lookup {
        if self.slots.is_empty() {
            return Lookup::Collision;
        }

        #[allow(clippy::indexing_slicing)]
        let slot = self.slots[self.slot_for(key_hash)];
        match slot.status {
            Status::Empty | Status::NotFoundSentinel => Lookup::NotFound,
            Status::Unique => Lookup::Unique(slot.block_idx, slot.entry_offset),
            Status::Collision => Lookup::Collision,
        }
    }

    pub fn encode_into(&self, writer: &mut Vec<u8>) -> crate::Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32::<LittleEndian>(self.slots.len() as u32)?;
        for slot in &self.slots {
            writer.write_u32::<LittleEndian>(slot.block_idx)?;
            writer.write_u8(slot.entry_offset)?;
            writer.write_u8(slot.status.into())?;
        }
        Ok(())
    }

    pub fn decode_from(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.is_empty() {
            return Ok(Self { slots: Vec::new() });
        }

        let mut reader = std::io::Cursor::new(bytes);
        let num_slots = reader.read_u32::<LittleEndian>()? as usize;

        let mut slots = Vec::with_capacity(num_slots);
        for _ in 0..num_slots {
            let block_idx = reader.read_u32::<LittleEndian>()?;
            let entry_offset = reader.read_u8()?;
            let status_tag = reader.read_u8()?;
            let status = Status::try_from(status_tag)
                .map_err(|()| crate::Error::Corruption(format!("bad hash index slot status {status_tag}")))?;
            slots.push(Slot {
                block_idx,
                entry_offset,
                status,
            });
        }

        Ok(Self { slots })
    }
}

/// Builds a [`HashIndex`] over `(key_hash, block_idx, entry_offset)` triples
/// emitted by the table builder in key order, using open addressing with
/// linear probing. A ~33% load factor, over-provisioning for low collision
/// rates, keeps most keys `Unique`.
pub struct HashIndexBuilder {
    entries: Vec<(u64, u32, u8)>,
}

impl HashIndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a key. Entries whose in-block offset does not fit in a
    /// `u8` are silently excluded: lookups for them report `Collision`,
    /// which is always a safe (if conservative) answer per the seek-fallback
    /// contract.
    pub fn push(&mut self, key_hash: u64, block_idx: u32, entry_offset_in_block: usize) {
        if let Ok(entry_offset) = u8::try_from(entry_offset_in_block) {
            self.entries.push((key_hash, block_idx, entry_offset));
        }
    }

    #[must_use]
    pub fn finish(self) -> HashIndex {
        if self.entries.is_empty() {
            return HashIndex { slots: Vec::new() };
        }

        let num_slots = (self.entries.len() * 3).max(4);
        let mut slots = vec![
            Slot {
                block_idx: 0,
                entry_offset: 0,
                status: Status::Empty,
            };
            num_slots
        ];

        #[allow(clippy::cast_possible_truncation)]
        let slot_of = |hash: u64| (hash % num_slots as u64) as usize;

        for &(hash, block_idx, entry_offset) in &self.entries {
            let idx = slot_of(hash);
            #[allow(clippy::indexing_slicing)]
            let slot = &mut slots[idx];
            slot.status = match slot.status {
                Status::Empty => {
                    slot.block_idx = block_idx;
                    slot.entry_offset = entry_offset;
                    Status::Unique
                }
                Status::Unique | Status::Collision => Status::Collision,
                Status::NotFoundSentinel => Status::Collision,
            };
        }

        HashIndex { slots }
    }
}

impl Default for HashIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        *self
    }
}
