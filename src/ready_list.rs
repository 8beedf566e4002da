//! # Ready List
//!
//! Circular doubly-linked ordering over the valid pool slots. Links are
//! slot indices stored in each record's `next`/`prev`, so the list needs no
//! storage of its own beyond the head and tail cursors.
//!
//! ```text
//!   head                         tail
//!  ┌────┐ next ┌────┐ next ┌────┐
//!  │ T0 │ ───► │ T1 │ ───► │ T2 │ ──┐
//!  └────┘ ◄─── └────┘ ◄─── └────┘   │
//!    ▲    prev        prev          │
//!    └──────────────────────────────┘
//! ```
//!
//! Entries are only ever appended; nothing is removed once added.

use crate::thread::{ThreadControlBlock, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyList {
    head: Option<ThreadId>,
    tail: Option<ThreadId>,
    len: usize,
}

impl ReadyList {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// First registered entry; dispatched first at launch.
    #[inline]
    pub fn head(&self) -> Option<ThreadId> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<ThreadId> {
        self.tail
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Splice `id` in between the current tail and head. The first entry
    /// becomes a one-node cycle pointing at itself.
    pub fn push_tail(&mut self, slots: &mut [ThreadControlBlock], id: ThreadId) {
        match (self.head, self.tail) {
            (Some(head), Some(tail)) => {
                slots[id.index()].next = head;
                slots[id.index()].prev = tail;
                slots[tail.index()].next = id;
                slots[head.index()].prev = id;
                self.tail = Some(id);
            }
            _ => {
                slots[id.index()].next = id;
                slots[id.index()].prev = id;
                self.head = Some(id);
                self.tail = Some(id);
            }
        }
        self.len += 1;
    }

    /// Entry following `id` in cycle order.
    #[inline]
    pub fn successor(&self, slots: &[ThreadControlBlock], id: ThreadId) -> ThreadId {
        slots[id.index()].next
    }

    /// Entry preceding `id` in cycle order.
    #[inline]
    pub fn predecessor(&self, slots: &[ThreadControlBlock], id: ThreadId) -> ThreadId {
        slots[id.index()].prev
    }

    /// Walk one full cycle starting at the head.
    pub fn iter<'a>(&self, slots: &'a [ThreadControlBlock]) -> Iter<'a> {
        Iter {
            slots,
            start: self.head,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Check the list invariant: the valid slots form exactly one cycle,
    /// linked consistently in both directions, and nothing else is in it.
    pub fn is_consistent(&self, slots: &[ThreadControlBlock]) -> bool {
        let valid = slots.iter().filter(|t| t.valid).count();
        if valid != self.len {
            return false;
        }
        let Some(head) = self.head else {
            return self.tail.is_none();
        };

        let mut cursor = head;
        for _ in 0..self.len {
            let slot = &slots[cursor.index()];
            if !slot.valid || slots[slot.next.index()].prev != cursor {
                return false;
            }
            cursor = slot.next;
        }
        // Back at the head after exactly `len` steps, and the tail closes it.
        cursor == head && self.tail.map(|t| slots[t.index()].next) == Some(head)
    }

    /// Forget all entries. Slot links are left for the pool to clear.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}

/// Cycle-order iterator produced by [`ReadyList::iter`].
pub struct Iter<'a> {
    slots: &'a [ThreadControlBlock],
    start: Option<ThreadId>,
    cursor: Option<ThreadId>,
    remaining: usize,
}

impl Iterator for Iter<'_> {
    type Item = ThreadId;

    fn next(&mut self) -> Option<ThreadId> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.cursor?;
        self.remaining -= 1;
        let next = self.slots[id.index()].next;
        self.cursor = if Some(next) == self.start { None } else { Some(next) };
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
