//! # Scheduler
//!
//! One scheduler core serving both policies. Selection always walks the
//! ready list in strict order; the policy only decides *when* selection
//! happens:
//!
//! - **Cooperative**: only on an explicit yield.
//! - **Round robin**: additionally on quantum expiry, detected by
//!   [`Scheduler::tick`].
//!
//! Selecting only records the pending thread. The register-state transfer
//! is performed later by the architecture's switch handler, which calls
//! [`Scheduler::commit`] to make the pending thread the running one.
//!
//! ```text
//!   tick() / yield_current()          PendSV
//!            │                          │
//!            ▼                          ▼
//!   pending = successor(run)  ──►  run = pending
//! ```

use crate::config::{KernelConfig, SchedulingPolicy};
use crate::context::{SavedContext, ThreadEntry};
use crate::error::KernelError;
use crate::pool::ThreadPool;
use crate::sync::{CriticalSection, InterruptMask};
use crate::thread::{Stack, ThreadId};

pub struct Scheduler {
    pool: ThreadPool,
    config: KernelConfig,
    /// Thread currently executing (`RunPt`).
    run: ThreadId,
    /// Thread selected for the next switch (`NextPt`).
    pending: Option<ThreadId>,
    /// Monotonic tick counter.
    ticks: u64,
}

impl Scheduler {
    pub const fn new(config: KernelConfig) -> Self {
        Self {
            pool: ThreadPool::new(),
            config,
            run: ThreadId::new(0),
            pending: None,
            ticks: 0,
        }
    }

    /// Drop every thread and return to the pre-registration state.
    pub fn reset<M: InterruptMask + ?Sized>(&mut self, cs: &CriticalSection<'_, M>) {
        self.pool.reset(cs);
        self.run = ThreadId::new(0);
        self.pending = None;
        self.ticks = 0;
    }

    /// Add a thread at the tail of the ready list.
    pub fn register<M, F>(
        &mut self,
        cs: &CriticalSection<'_, M>,
        entry: ThreadEntry,
        stack_size_hint: u32,
        make_frame: F,
    ) -> Result<ThreadId, KernelError>
    where
        M: InterruptMask + ?Sized,
        F: FnOnce(ThreadEntry, &mut Stack) -> SavedContext,
    {
        let reload = self.config.quantum_reload();
        self.pool.register(cs, entry, stack_size_hint, reload, make_frame)
    }

    /// Make the head of the ready list the running thread and return its
    /// saved context for the first dispatch. `None` if nothing is registered.
    pub fn start(&mut self) -> Option<SavedContext> {
        let head = self.pool.head()?;
        self.run = head;
        self.pending = None;
        Some(self.pool.slot(head).saved)
    }

    /// Select the successor of the running thread as pending.
    pub fn select_next(&mut self) -> ThreadId {
        let next = self.pool.successor(self.run);
        self.pending = Some(next);
        next
    }

    /// Cooperative yield from the running thread.
    pub fn yield_current(&mut self) -> ThreadId {
        self.select_next()
    }

    /// Account one timer tick. Returns `true` when a switch should be
    /// requested (round-robin quantum expiry).
    pub fn tick(&mut self) -> bool {
        self.ticks = self.ticks.wrapping_add(1);
        match self.config.policy() {
            SchedulingPolicy::Cooperative => false,
            SchedulingPolicy::RoundRobin => {
                if self.pool.is_empty() {
                    return false;
                }
                let reload = self.config.quantum_reload();
                if self.pool.slot_mut(self.run).charge_tick(reload) {
                    self.select_next();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Store the outgoing thread's context, make the pending thread the
    /// running one and return its context. With nothing pending the running
    /// thread simply resumes.
    pub fn switch_context(&mut self, outgoing: SavedContext) -> SavedContext {
        self.pool.slot_mut(self.run).saved = outgoing;
        let next = self.commit();
        self.pool.slot(next).saved
    }

    /// Promote the pending selection to running.
    pub fn commit(&mut self) -> ThreadId {
        if let Some(next) = self.pending.take() {
            self.run = next;
        }
        self.run
    }

    #[inline]
    pub fn running(&self) -> ThreadId {
        self.run
    }

    #[inline]
    pub fn pending(&self) -> Option<ThreadId> {
        self.pending
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[inline]
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }
}
