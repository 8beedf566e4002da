//! # Thread Control Block
//!
//! Per-thread kernel metadata and saved execution state. Records live in a
//! fixed array inside the [`ThreadPool`](crate::pool::ThreadPool) and are
//! addressed by slot index; the `next`/`prev` indices form the circular
//! ready list.

use core::fmt;

use crate::config::STACK_WORDS;
use crate::context::SavedContext;

/// Stable thread identity, equal to the pool slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Pool slot index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Private stack region of one thread, 8-byte aligned as required by AAPCS.
#[repr(C, align(8))]
pub struct Stack {
    words: [u32; STACK_WORDS],
}

impl Stack {
    pub const fn new() -> Self {
        Self {
            words: [0; STACK_WORDS],
        }
    }

    #[inline]
    pub fn words(&self) -> &[u32; STACK_WORDS] {
        &self.words
    }

    #[inline]
    pub fn words_mut(&mut self) -> &mut [u32; STACK_WORDS] {
        &mut self.words
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread Control Block.
///
/// `saved` is meaningful only while the thread is not the one executing.
/// `next`/`prev` are meaningful only while `valid` is set.
pub struct ThreadControlBlock {
    /// Saved stack pointer into `stack`.
    pub saved: SavedContext,

    /// Successor in the ready list.
    pub next: ThreadId,

    /// Predecessor in the ready list.
    pub prev: ThreadId,

    /// Ticks left before a forced switch (round-robin only).
    pub quantum_remaining: u32,

    /// Reserved. Never read by the scheduler.
    pub sleep_state: u32,

    /// Reserved. Never read by the scheduler.
    pub blocked_state: u32,

    /// Reserved. Selection is strict list order; this is not honoured.
    pub priority: u32,

    /// Equal to the slot index once registered.
    pub id: ThreadId,

    /// Slot holds a registered thread and takes part in the ready list.
    pub valid: bool,

    pub stack: Stack,
}

// Safety: `saved` only ever points into the record's own stack, and
// records are mutated only inside critical sections or the switch handler.
unsafe impl Send for ThreadControlBlock {}
unsafe impl Sync for ThreadControlBlock {}

impl ThreadControlBlock {
    /// Unregistered slot. Used to initialize the static pool.
    pub const EMPTY: Self = Self::empty();

    pub const fn empty() -> Self {
        Self {
            saved: SavedContext::null(),
            next: ThreadId::new(0),
            prev: ThreadId::new(0),
            quantum_remaining: 0,
            sleep_state: 0,
            blocked_state: 0,
            priority: 0,
            id: ThreadId::new(0),
            valid: false,
            stack: Stack::new(),
        }
    }

    /// Fill in bookkeeping for a freshly registered thread. Links are set
    /// by the ready list.
    pub fn activate(&mut self, id: ThreadId, quantum_reload: u32, saved: SavedContext) {
        self.saved = saved;
        self.quantum_remaining = quantum_reload;
        self.sleep_state = 0;
        self.blocked_state = 0;
        self.priority = 0;
        self.id = id;
        self.valid = true;
    }

    /// Return the slot to its unregistered state. Stack contents are kept.
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.saved = SavedContext::null();
        self.quantum_remaining = 0;
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Charge one tick. Returns `true` when the quantum has just expired,
    /// in which case the counter is reloaded.
    pub fn charge_tick(&mut self, quantum_reload: u32) -> bool {
        self.quantum_remaining = self.quantum_remaining.saturating_sub(1);
        if self.quantum_remaining == 0 {
            self.quantum_remaining = quantum_reload;
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for ThreadControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadControlBlock")
            .field("id", &self.id)
            .field("valid", &self.valid)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .field("quantum_remaining", &self.quantum_remaining)
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}
