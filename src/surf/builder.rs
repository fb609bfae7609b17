// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{suffix_hash, EntryPosition, Surf, TERMINATOR};
use crate::bitvec::BitVec;
use std::collections::{BTreeMap, VecDeque};

/// Builds a [`Surf`] filter from a sorted sequence of `(key, position)`
/// pairs by constructing a temporary in-memory trie, then flattening it
/// into LOUDS order via a breadth-first walk.
pub struct SurfBuilder;

#[derive(Default)]
struct TrieNode {
    children: BTreeMap<u8, TrieNode>,
    /// Set when this exact node (not a longer key through it) is a leaf.
    value: Option<EntryPosition>,
}

impl TrieNode {
    fn insert(&mut self, key: &[u8], position: EntryPosition) {
        match key.split_first() {
            None => self.value = Some(position),
            Some((&byte, rest)) => self.children.entry(byte).or_default().insert(rest, position),
        }
    }
}

impl SurfBuilder {
    /// Builds a [`Surf`] over an already-sorted, deduplicated key set.
    #[must_use]
    pub fn build<'a, I>(entries: I) -> Surf
    where
        I: IntoIterator<Item = (&'a [u8], EntryPosition)>,
    {
        let mut root = TrieNode::default();
        for (key, pos) in entries {
            root.insert(key, pos);
        }

        let mut labels = Vec::new();
        let mut has_child = BitVec::new();
        let mut louds = BitVec::new();
        let mut values = Vec::new();
        let mut suffixes = Vec::new();

        // Each queue entry carries the key prefix accumulated on the path
        // from the root, so leaves can compute a suffix hash of the full key.
        let mut queue: VecDeque<(Vec<u8>, TrieNode)> = VecDeque::new();
        queue.push_back((Vec::new(), root));

        while let Some((prefix, node)) = queue.pop_front() {
            // A node with its own terminal value gets a synthetic 0xFF
            // child so the value still has a normal leaf edge slot.
            let mut children: Vec<(u8, TrieNode)> = node.children.into_iter().collect();
            if let Some(value) = node.value {
                children.push((
                    TERMINATOR,
                    TrieNode {
                        children: BTreeMap::new(),
                        value: Some(value),
                    },
                ));
                children.sort_by_key(|(label, _)| *label);
            }

            if children.is_empty() {
                continue;
            }

            for (i, (label, child)) in children.into_iter().enumerate() {
                labels.push(label);
                louds.push(i == 0);

                let mut child_key = prefix.clone();
                if label != TERMINATOR || !child.children.is_empty() {
                    child_key.push(label);
                }

                if child.children.is_empty() {
                    has_child.push(false);
                    #[allow(clippy::expect_used)]
                    let value = child
                        .value
                        .expect("leaf trie node must carry a stored value");
                    suffixes.push(suffix_hash(&child_key));
                    values.push(value);
                } else {
                    has_child.push(true);
                    queue.push_back((child_key, child));
                }
            }
        }

        Surf {
            labels,
            has_child,
            louds,
            values,
            suffixes,
        }
    }
}
