// src/core/registry.rs

//! The ordered set of requests that have been written to the socket and are
//! still waiting for their reply line.
//!
//! # Correlation
//!
//! The protocol carries no request identifiers. The server answers requests
//! one line each, in the order it received them, so the n-th line read belongs
//! to the n-th request written. The registry is therefore a plain FIFO: a
//! submitter appends a slot while holding the client's write lock, and the
//! reader pops the front slot for every line it reads.
//!
//! Each slot is a `oneshot` sender. Popping a slot moves the sender out of the
//! queue, so a slot can be completed at most once, and completing it never
//! blocks the reader.
//!
//! # Sealing
//!
//! When the connection ends, [`PendingRegistry::fail_all`] drains every slot
//! with the terminal error and seals the registry with it. A submitter that
//! reaches `push` after that point gets the error back immediately instead of
//! parking a slot nobody will ever complete.

use crate::core::ClientError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::debug;

/// The outcome delivered to a waiting submitter: its reply line, or the error
/// that ended the connection.
pub type SlotResult = Result<String, ClientError>;

/// Identifies one slot, so a submitter can withdraw exactly its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

#[derive(Debug)]
struct PendingSlot {
    id: SlotId,
    tx: oneshot::Sender<SlotResult>,
}

#[derive(Debug, Default)]
struct RegistryState {
    slots: VecDeque<PendingSlot>,
    sealed: Option<ClientError>,
}

/// FIFO of outstanding request slots. The lock is only ever held for the
/// queue operation itself, never across socket I/O.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends a new slot at the back of the queue and returns its id and the
    /// receiving end the submitter waits on.
    ///
    /// Fails with the sealing error if the connection has already ended.
    pub fn push(&self) -> Result<(SlotId, oneshot::Receiver<SlotResult>), ClientError> {
        let id = SlotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();

        let mut state = self.state.lock();
        if let Some(err) = &state.sealed {
            return Err(err.clone());
        }
        state.slots.push_back(PendingSlot { id, tx });
        Ok((id, rx))
    }

    /// Completes the oldest slot with `line`.
    ///
    /// Returns false when no slot was waiting, in which case the line is
    /// dropped.
    pub fn complete_front(&self, line: String) -> bool {
        let slot = self.state.lock().slots.pop_front();
        match slot {
            Some(slot) => {
                // The submitter may have gone away; that only discards its reply.
                if slot.tx.send(Ok(line)).is_err() {
                    debug!("Reply for slot {:?} dropped: submitter is gone.", slot.id);
                }
                true
            }
            None => false,
        }
    }

    /// Withdraws the slot with `id`, wherever it sits in the queue.
    ///
    /// Returns false if it was no longer registered (already completed or
    /// drained by a concurrent teardown).
    pub fn remove(&self, id: SlotId) -> bool {
        let mut state = self.state.lock();
        // The slot was normally just appended, so look from the back.
        match state.slots.iter().rposition(|slot| slot.id == id) {
            Some(pos) => {
                state.slots.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Seals the registry with `err` and fails every outstanding slot with it.
    ///
    /// The first call wins: a registry that is already sealed keeps its
    /// original error. Returns the number of slots that were failed.
    pub fn fail_all(&self, err: ClientError) -> usize {
        let drained: Vec<PendingSlot> = {
            let mut state = self.state.lock();
            if state.sealed.is_none() {
                state.sealed = Some(err.clone());
            }
            state.slots.drain(..).collect()
        };

        // Senders are completed outside the lock.
        let count = drained.len();
        for slot in drained {
            let _ = slot.tx.send(Err(err.clone()));
        }
        count
    }

    /// Number of slots currently waiting for a reply.
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`fail_all`](Self::fail_all) has run.
    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed.is_some()
    }
}
