//! Where page snapshots come from.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use formscout_core::PageSnapshot;

use crate::error::SnapshotError;

/// Supplies the current state of the page on demand.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn snapshot(&self) -> Result<PageSnapshot, SnapshotError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    current: Option<PageSnapshot>,
    failures: u32,
}

/// A page held in memory. The snapshot can be swapped to simulate DOM
/// mutations, and upcoming reads can be made to fail.
#[derive(Debug, Default)]
pub struct MemorySource {
    state: Mutex<MemoryState>,
}

impl MemorySource {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                current: Some(snapshot),
                failures: 0,
            }),
        }
    }

    /// A source with no document loaded; every read fails.
    pub fn empty() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, snapshot: PageSnapshot) {
        self.lock().current = Some(snapshot);
    }

    pub fn clear(&self) {
        self.lock().current = None;
    }

    /// Make the next `n` reads fail as not ready.
    pub fn fail_next(&self, n: u32) {
        self.lock().failures = n;
    }
}

#[async_trait]
impl PageSource for MemorySource {
    async fn snapshot(&self) -> Result<PageSnapshot, SnapshotError> {
        let mut state = self.lock();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(SnapshotError::NotReady("document is mutating".into()));
        }
        state
            .current
            .clone()
            .ok_or_else(|| SnapshotError::NotReady("no document loaded".into()))
    }
}
