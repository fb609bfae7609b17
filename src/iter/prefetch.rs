// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A bounded value-prefetch worker pool. The value log itself lives outside
//! this crate, so what's implemented here is the *pool*: a small fixed set
//! of OS threads draining a bounded `crossbeam-channel`, each job resolving
//! a [`ValuePointer`] and signalling completion through a [`PrefetchSlot`]
//! the iterator can block on independently of every other in-flight job.
//!
//! The worker-pool idiom follows `crossbeam-channel`'s own documented
//! bounded mpmc pattern.

use crate::table::TableId;
use crate::Slice;
use crossbeam_channel::{bounded, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// Something a prefetch job resolves into a value's bytes.
///
/// `Inline` covers values this crate can already resolve on its own (the
/// value lives directly in a block or its old-version sidecar); `ValueLog`
/// is the value-pointer escape hatch for a host that stores large values
/// out-of-line, resolved through an injected [`ValueResolver`].
#[derive(Clone, Debug)]
pub enum ValuePointer {
    Inline {
        table_id: TableId,
        block_idx: u32,
        offset_in_block: u32,
        value: Slice,
    },
    ValueLog {
        file_id: u64,
        offset: u64,
        size: u32,
    },
}

/// Host-provided dereferencer for the `ValueLog` pointer variant. The wire
/// format and storage of the value log are out of scope for this crate;
/// this trait is the seam a real value-log implementation plugs into.
pub trait ValueResolver: Send + Sync {
    fn resolve(&self, file_id: u64, offset: u64, size: u32) -> crate::Result<Slice>;
}

/// One in-flight prefetch's completion channel. `Item::value()` in the
/// caller blocks on its own slot only, never on the pool as a whole.
pub type PrefetchSlot = Arc<(Mutex<Option<crate::Result<Slice>>>, Condvar)>;

struct Job {
    pointer: ValuePointer,
    slot: PrefetchSlot,
}

/// A small fixed pool of worker threads resolving [`ValuePointer`]s handed
/// to it via [`PrefetchPool::submit`]. Torn down on `Drop`: the sending
/// half of the channel is dropped first so workers observe a closed
/// channel and exit, then every worker thread is joined.
pub struct PrefetchPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl PrefetchPool {
    /// Spawns `worker_count` threads sharing one bounded (`queue_depth`)
    /// job channel.
    #[must_use]
    pub fn new(worker_count: usize, queue_depth: usize, resolver: Arc<dyn ValueResolver>) -> Self {
        let (sender, receiver) = bounded::<Job>(queue_depth.max(1));
        let mut workers = Vec::with_capacity(worker_count);

        for _ in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let resolver = Arc::clone(&resolver);

            workers.push(std::thread::spawn(move || {
                while let Ok(job) = receiver.recv() {
                    let result = match job.pointer {
                        ValuePointer::Inline { value, .. } => Ok(value),
                        ValuePointer::ValueLog {
                            file_id,
                            offset,
                            size,
                        } => resolver.resolve(file_id, offset, size),
                    };

                    let (lock, condvar) = &*job.slot;
                    #[allow(clippy::expect_used)]
                    let mut guard = lock.lock().expect("prefetch slot mutex poisoned");
                    *guard = Some(result);
                    condvar.notify_all();
                }
            }));
        }

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Enqueues a resolve job, returning a slot the caller can later block
    /// on via [`await_slot`]. If the pool has already been torn down, the
    /// returned slot simply never completes -- callers that still hold a
    /// `PrefetchPool` alive never observe this.
    #[must_use]
    pub fn submit(&self, pointer: ValuePointer) -> PrefetchSlot {
        let slot: PrefetchSlot = Arc::new((Mutex::new(None), Condvar::new()));

        if let Some(sender) = &self.sender {
            let _ = sender.send(Job {
                pointer,
                slot: Arc::clone(&slot),
            });
        }

        slot
    }
}

impl Drop for PrefetchPool {
    fn drop(&mut self) {
        self.sender = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Blocks the calling thread until `slot`'s job completes, returning its
/// result. This is the suspension point a deferred value read waits on.
#[allow(clippy::expect_used)]
#[must_use]
pub fn await_slot(slot: &PrefetchSlot) -> crate::Result<Slice> {
    let (lock, condvar) = &**slot;
    let mut guard = lock.lock().expect("prefetch slot mutex poisoned");
    while guard.is_none() {
        guard = condvar.wait(guard).expect("prefetch slot mutex poisoned");
    }
    guard.take().expect("checked Some in the loop above")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    struct StubResolver;

    impl ValueResolver for StubResolver {
        fn resolve(&self, file_id: u64, offset: u64, size: u32) -> crate::Result<Slice> {
            Ok(Slice::from(format!("{file_id}:{offset}:{size}").into_bytes()))
        }
    }

    #[test]
    fn inline_pointer_resolves_to_its_own_value() {
        let pool = PrefetchPool::new(2, 8, Arc::new(StubResolver));

        let slot = pool.submit(ValuePointer::Inline {
            table_id: 1,
            block_idx: 0,
            offset_in_block: 0,
            value: Slice::new(b"hello"),
        });

        let value = await_slot(&slot).expect("resolve should succeed");
        assert_eq!(value.as_ref(), b"hello");
    }

    #[test]
    fn value_log_pointer_goes_through_the_resolver() {
        let pool = PrefetchPool::new(2, 8, Arc::new(StubResolver));

        let slot = pool.submit(ValuePointer::ValueLog {
            file_id: 7,
            offset: 42,
            size: 100,
        });

        let value = await_slot(&slot).expect("resolve should succeed");
        assert_eq!(value.as_ref(), b"7:42:100");
    }

    #[test]
    fn many_concurrent_jobs_all_complete() {
        let pool = PrefetchPool::new(4, 16, Arc::new(StubResolver));

        let slots: Vec<_> = (0..50)
            .map(|i| {
                pool.submit(ValuePointer::ValueLog {
                    file_id: i,
                    offset: 0,
                    size: 1,
                })
            })
            .collect();

        for (i, slot) in slots.into_iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let expected = format!("{i}:0:1");
            let value = await_slot(&slot).expect("resolve should succeed");
            assert_eq!(value.as_ref(), expected.as_bytes());
        }
    }
}
