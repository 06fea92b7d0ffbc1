//! In-memory persistence for tests and ephemeral deployments

use super::{Backend, BackendError, Loaded};
use crate::core::record::Record;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Committed {
    records: Vec<Record>,
    next_seq: Option<u64>,
    commits: usize,
}

/// Keeps the last committed collection in memory
///
/// Commits can be made to fail on demand with
/// [`fail_next_commits`](Self::fail_next_commits), or to be stored and then
/// reported as not flushed with [`fail_next_syncs`](Self::fail_next_syncs).
#[derive(Default)]
pub struct MemoryBackend {
    committed: Mutex<Committed>,
    failures_pending: AtomicUsize,
    unsynced_pending: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with records that appear already committed
    pub fn with_records(records: Vec<Record>) -> Self {
        MemoryBackend {
            committed: Mutex::new(Committed {
                records,
                next_seq: None,
                commits: 0,
            }),
            failures_pending: AtomicUsize::new(0),
            unsynced_pending: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` commits fail with an IO error
    pub fn fail_next_commits(&self, n: usize) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` commits store their records, then fail as unflushed
    pub fn fail_next_syncs(&self, n: usize) {
        self.unsynced_pending.store(n, Ordering::SeqCst);
    }

    pub fn committed_records(&self) -> Vec<Record> {
        self.committed.lock().records.clone()
    }

    pub fn committed_next_seq(&self) -> Option<u64> {
        self.committed.lock().next_seq
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.committed.lock().commits
    }
}

impl Backend for MemoryBackend {
    fn load(&self) -> Result<Loaded, BackendError> {
        let committed = self.committed.lock();
        Ok(Loaded {
            records: committed.records.clone(),
            next_seq: committed.next_seq,
            discarded: None,
        })
    }

    fn commit(&self, records: &[Record], next_seq: u64) -> Result<(), BackendError> {
        if take_one(&self.failures_pending) {
            return Err(io::Error::other("injected commit failure").into());
        }

        let mut committed = self.committed.lock();
        committed.records = records.to_vec();
        committed.next_seq = Some(next_seq);
        committed.commits += 1;

        if take_one(&self.unsynced_pending) {
            return Err(BackendError::Unsynced(io::Error::other(
                "injected flush failure",
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

fn take_one(pending: &AtomicUsize) -> bool {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
