//! Per-key mutual exclusion for in-flight fetches.
//!
//! The [`Gate`] lets at most one caller per key proceed at a time. Callers for
//! the same key queue in FIFO order; distinct keys never contend. A key's
//! lock entry is dropped from the table once its last holder releases with
//! no one else waiting, so the table only ever holds keys currently in use.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    /// Tokens for this key, held or waiting.
    users: usize,
}

type Table = Mutex<HashMap<String, Slot>>;

/// A table of per-key locks.
#[derive(Debug, Default, Clone)]
pub struct Gate {
    table: Arc<Table>,
}

impl Gate {
    /// Create an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other token for `key` is held, then take one.
    ///
    /// The returned token releases the key when dropped, including when the
    /// enclosing future is dropped or unwinds.
    pub async fn acquire(&self, key: &str) -> GateToken {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = table.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.lock)
        };
        // Created before waiting so a waiter that is dropped mid-wait still
        // sweeps the entry.
        let mut token = GateToken {
            guard: None,
            key: key.to_string(),
            table: Arc::clone(&self.table),
        };
        token.guard = Some(lock.lock_owned().await);
        token
    }

    /// Number of keys that currently have a holder or waiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key is currently held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one key of a [`Gate`].
#[derive(Debug)]
pub struct GateToken {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    table: Arc<Table>,
}

impl GateToken {
    /// The key this token holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for GateToken {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = table.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                table.remove(&self.key);
            }
        }
    }
}
