//! # Thread Pool
//!
//! Fixed-capacity array of thread control blocks plus the ready list that
//! threads the valid ones into a cycle. Registration is the only mutator and
//! requires a [`CriticalSection`] as proof that interrupts are masked.

use crate::config::MAX_THREADS;
use crate::context::{SavedContext, ThreadEntry};
use crate::error::KernelError;
use crate::ready_list::{self, ReadyList};
use crate::sync::{CriticalSection, InterruptMask};
use crate::thread::{Stack, ThreadControlBlock, ThreadId};

pub struct ThreadPool {
    slots: [ThreadControlBlock; MAX_THREADS],
    ready: ReadyList,
    num_threads: usize,
}

impl ThreadPool {
    pub const fn new() -> Self {
        Self {
            slots: [ThreadControlBlock::EMPTY; MAX_THREADS],
            ready: ReadyList::new(),
            num_threads: 0,
        }
    }

    /// Mark every slot invalid and empty the ready list.
    pub fn reset<M: InterruptMask + ?Sized>(&mut self, _cs: &CriticalSection<'_, M>) {
        for slot in self.slots.iter_mut() {
            slot.invalidate();
        }
        self.ready.clear();
        self.num_threads = 0;
    }

    /// Register a thread in the first free slot.
    ///
    /// `make_frame` synthesizes the initial execution frame on the slot's
    /// stack. Every stack is `STACK_WORDS` long; `_stack_size_hint` is
    /// reserved for variable-sized stacks.
    ///
    /// Nothing is modified when the pool is full.
    pub fn register<M, F>(
        &mut self,
        _cs: &CriticalSection<'_, M>,
        entry: ThreadEntry,
        _stack_size_hint: u32,
        quantum_reload: u32,
        make_frame: F,
    ) -> Result<ThreadId, KernelError>
    where
        M: InterruptMask + ?Sized,
        F: FnOnce(ThreadEntry, &mut Stack) -> SavedContext,
    {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.valid)
            .ok_or(KernelError::CapacityExceeded)?;
        let id = ThreadId::new(index);

        let slot = &mut self.slots[index];
        let saved = make_frame(entry, &mut slot.stack);
        slot.activate(id, quantum_reload, saved);
        self.num_threads += 1;
        self.ready.push_tail(&mut self.slots, id);
        Ok(id)
    }

    /// Count of valid slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.num_threads
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_threads == 0
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX_THREADS
    }

    /// Record for a registered thread.
    pub fn get(&self, id: ThreadId) -> Option<&ThreadControlBlock> {
        self.slots.get(id.index()).filter(|slot| slot.valid)
    }

    pub(crate) fn slot(&self, id: ThreadId) -> &ThreadControlBlock {
        &self.slots[id.index()]
    }

    pub(crate) fn slot_mut(&mut self, id: ThreadId) -> &mut ThreadControlBlock {
        &mut self.slots[id.index()]
    }

    #[inline]
    pub fn head(&self) -> Option<ThreadId> {
        self.ready.head()
    }

    /// Entry after `id` in the ready list.
    #[inline]
    pub fn successor(&self, id: ThreadId) -> ThreadId {
        self.ready.successor(&self.slots, id)
    }

    /// Registered threads in cycle order, starting at the head.
    pub fn ready_threads(&self) -> ready_list::Iter<'_> {
        self.ready.iter(&self.slots)
    }

    /// Ready-list invariant holds for the current slot contents.
    pub fn is_consistent(&self) -> bool {
        self.ready.len() == self.num_threads && self.ready.is_consistent(&self.slots)
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimPort;
    use crate::context::synthesize_initial_frame;
    use crate::sync::critical_section;

    extern "C" fn worker() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn register(pool: &mut ThreadPool, port: &SimPort) -> Result<ThreadId, KernelError> {
        critical_section(port, |cs| {
            pool.register(cs, worker, 128, 249, synthesize_initial_frame)
        })
    }

    #[test]
    fn test_register_fills_slots_in_order() {
        let port = SimPort::new();
        let mut pool = ThreadPool::new();

        for expected in 0..3 {
            let id = register(&mut pool, &port).unwrap();
            assert_eq!(id.index(), expected);
            let tcb = pool.get(id).unwrap();
            assert_eq!(tcb.id, id);
            assert_eq!(tcb.quantum_remaining, 249);
            assert!(!tcb.saved.is_null());
        }
        assert_eq!(pool.len(), 3);
        assert!(pool.is_consistent());
        let order: Vec<_> = pool.ready_threads().map(ThreadId::index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_capacity_exceeded_leaves_pool_unchanged() {
        let port = SimPort::new();
        let mut pool = ThreadPool::new();
        for _ in 0..MAX_THREADS {
            register(&mut pool, &port).unwrap();
        }
        let before: Vec<_> = pool.ready_threads().collect();

        assert_eq!(register(&mut pool, &port), Err(KernelError::CapacityExceeded));
        assert_eq!(pool.len(), MAX_THREADS);
        assert_eq!(pool.ready_threads().collect::<Vec<_>>(), before);
        assert!(pool.is_consistent());
        // Guard released on the error path.
        assert!(port.interrupts_enabled());
    }

    #[test]
    fn test_get_rejects_invalid_slots() {
        let pool = ThreadPool::new();
        assert!(pool.get(ThreadId::new(0)).is_none());
        assert!(pool.get(ThreadId::new(MAX_THREADS)).is_none());
    }

    #[test]
    fn test_reset_empties_pool() {
        let port = SimPort::new();
        let mut pool = ThreadPool::new();
        register(&mut pool, &port).unwrap();
        register(&mut pool, &port).unwrap();

        critical_section(&port, |cs| pool.reset(cs));
        assert!(pool.is_empty());
        assert!(pool.head().is_none());
        assert!(pool.is_consistent());
        assert_eq!(register(&mut pool, &port).unwrap().index(), 0);
    }
}
