// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The user-facing snapshot layer: takes the merge iterator's `(user_key
//! asc, version desc)` stream and applies read-timestamp visibility,
//! newest-version selection and tombstone suppression.

use crate::double_ended_peekable::{DoubleEndedPeekable, DoubleEndedPeekableExt};
use crate::{InternalValue, SeqNo, UserKey};

use super::merge_iter::BoxedIterator;

/// Drops any version newer than `read_ts`: the read timestamp a snapshot
/// was opened at must never observe writes committed after it.
struct VersionFilter<I> {
    inner: I,
    read_ts: SeqNo,
}

impl<I: Iterator<Item = crate::Result<InternalValue>>> Iterator for VersionFilter<I> {
    type Item = crate::Result<InternalValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = fail_iter!(self.inner.next()?);
            if item.key.seqno <= self.read_ts {
                return Some(Ok(item));
            }
        }
    }
}

impl<I: DoubleEndedIterator<Item = crate::Result<InternalValue>>> DoubleEndedIterator
    for VersionFilter<I>
{
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let item = fail_iter!(self.inner.next_back()?);
            if item.key.seqno <= self.read_ts {
                return Some(Ok(item));
            }
        }
    }
}

/// Consumes a stream of KVs already filtered to a read timestamp and emits
/// one entry per distinct user key: the newest surviving version. Does not
/// interpret tombstones -- see [`TombstoneFilter`].
struct MvccStream<I: DoubleEndedIterator<Item = crate::Result<InternalValue>>> {
    inner: DoubleEndedPeekable<crate::Result<InternalValue>, I>,
}

impl<I: DoubleEndedIterator<Item = crate::Result<InternalValue>>> MvccStream<I> {
    fn new(iter: I) -> Self {
        Self {
            inner: iter.double_ended_peekable(),
        }
    }

    fn drain_key_min(&mut self, key: &UserKey) -> crate::Result<()> {
        loop {
            let Some(next) = self.inner.next_if(|kv| {
                if let Ok(kv) = kv {
                    kv.key.user_key == key
                } else {
                    true
                }
            }) else {
                return Ok(());
            };

            next?;
        }
    }
}

impl<I: DoubleEndedIterator<Item = crate::Result<InternalValue>>> Iterator for MvccStream<I> {
    type Item = crate::Result<InternalValue>;

    fn next(&mut self) -> Option<Self::Item> {
        let head = fail_iter!(self.inner.next()?);
        fail_iter!(self.drain_key_min(&head.key.user_key));
        Some(Ok(head))
    }
}

impl<I: DoubleEndedIterator<Item = crate::Result<InternalValue>>> DoubleEndedIterator
    for MvccStream<I>
{
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let tail = fail_iter!(self.inner.next_back()?);

            let prev = match self.inner.peek_back() {
                Some(Ok(prev)) => prev,
                Some(Err(_)) => {
                    #[expect(
                        clippy::expect_used,
                        reason = "we just asserted, the peeked value is an error"
                    )]
                    return Some(Err(self
                        .inner
                        .next_back()
                        .expect("should exist")
                        .expect_err("should be error")));
                }
                None => return Some(Ok(tail)),
            };

            if prev.key.user_key < tail.key.user_key {
                return Some(Ok(tail));
            }
        }
    }
}

/// Drops tombstones: a deletion is only ever visible as the *absence* of a
/// key, never as an emitted record, unless the caller asked to see every
/// version (see [`SnapshotIter::new`]).
struct TombstoneFilter<I> {
    inner: I,
}

impl<I: Iterator<Item = crate::Result<InternalValue>>> Iterator for TombstoneFilter<I> {
    type Item = crate::Result<InternalValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = fail_iter!(self.inner.next()?);
            if !item.is_tombstone() {
                return Some(Ok(item));
            }
        }
    }
}

impl<I: DoubleEndedIterator<Item = crate::Result<InternalValue>>> DoubleEndedIterator
    for TombstoneFilter<I>
{
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let item = fail_iter!(self.inner.next_back()?);
            if !item.is_tombstone() {
                return Some(Ok(item));
            }
        }
    }
}

/// The iterator returned to callers of a read transaction / snapshot scan.
///
/// Wraps a merged `(user_key asc, version desc)` stream with:
/// - a `read_ts` cutoff (versions committed after the snapshot was opened
///   are invisible),
/// - newest-version selection per user key, unless `all_versions` was
///   requested, in which case every surviving version is emitted,
/// - tombstone suppression, unless `all_versions` was requested.
pub struct SnapshotIter<'a> {
    inner: BoxedIterator<'a>,
}

impl<'a> SnapshotIter<'a> {
    #[must_use]
    pub fn new<I>(iter: I, read_ts: SeqNo, all_versions: bool) -> Self
    where
        I: DoubleEndedIterator<Item = crate::Result<InternalValue>> + 'a,
    {
        let filtered = VersionFilter { inner: iter, read_ts };

        let inner: BoxedIterator<'a> = if all_versions {
            Box::new(filtered)
        } else {
            Box::new(TombstoneFilter {
                inner: MvccStream::new(filtered),
            })
        };

        Self { inner }
    }
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = crate::Result<InternalValue>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a> DoubleEndedIterator for SnapshotIter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueType;
    use test_log::test;

    fn boxed(values: Vec<InternalValue>) -> BoxedIterator<'static> {
        Box::new(values.into_iter().map(Ok))
    }

    #[test]
    fn hides_versions_newer_than_read_ts() -> crate::Result<()> {
        let values = vec![
            InternalValue::from_components(*b"a", *b"newer", 10, ValueType::Value),
            InternalValue::from_components(*b"a", *b"older", 5, ValueType::Value),
        ];

        let iter = SnapshotIter::new(boxed(values), 5, false);
        let out = iter.collect::<crate::Result<Vec<_>>>()?;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value.value.as_ref(), b"older");

        Ok(())
    }

    #[test]
    fn suppresses_tombstones_by_default() -> crate::Result<()> {
        let values = vec![
            InternalValue::new_tombstone(*b"a", 2),
            InternalValue::from_components(*b"a", *b"old", 1, ValueType::Value),
            InternalValue::from_components(*b"b", *b"b", 0, ValueType::Value),
        ];

        let iter = SnapshotIter::new(boxed(values), 100, false);
        let out = iter.collect::<crate::Result<Vec<_>>>()?;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key.user_key.as_ref(), b"b");

        Ok(())
    }

    #[test]
    fn all_versions_mode_surfaces_tombstones_and_every_version() -> crate::Result<()> {
        let values = vec![
            InternalValue::new_tombstone(*b"a", 2),
            InternalValue::from_components(*b"a", *b"old", 1, ValueType::Value),
        ];

        let iter = SnapshotIter::new(boxed(values), 100, true);
        let out = iter.collect::<crate::Result<Vec<_>>>()?;

        assert_eq!(out.len(), 2);
        assert!(out[0].is_tombstone());
        assert!(!out[1].is_tombstone());

        Ok(())
    }

    #[test]
    fn reverse_iteration_matches_forward_reversed() -> crate::Result<()> {
        let values = vec![
            InternalValue::from_components(*b"a", *b"a", 0, ValueType::Value),
            InternalValue::from_components(*b"b", *b"b", 0, ValueType::Value),
            InternalValue::from_components(*b"c", *b"c", 0, ValueType::Value),
        ];

        let forward = SnapshotIter::new(boxed(values.clone()), 100, false)
            .collect::<crate::Result<Vec<_>>>()?;
        let mut backward = SnapshotIter::new(boxed(values), 100, false)
            .rev()
            .collect::<crate::Result<Vec<_>>>()?;
        backward.reverse();

        assert_eq!(forward, backward);

        Ok(())
    }
}
