//! # Kernel
//!
//! Top-level kernel context and public API for RROS.
//!
//! [`Kernel`] owns the scheduler (thread pool and ready list) together with
//! the architecture port and is passed explicitly to every operation. The
//! firmware keeps exactly one instance in a static and exposes it through the
//! free functions at the bottom of this module, which is also where the
//! interrupt handlers find it.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()            ← Mask interrupts, base clock, empty pool
//!         ├─► kernel::register_thread() ← Fill pool slots (×N)
//!         └─► kernel::launch()          ← No return
//!               ├─► Configure SysTick + priorities (critical section)
//!               └─► Enter the ready-list head in thread mode
//! ```

use crate::arch::Port;
use crate::config::{KernelConfig, MAX_THREADS};
use crate::context::{SavedContext, ThreadEntry};
use crate::error::KernelError;
use crate::ready_list;
use crate::scheduler::Scheduler;
use crate::sync::critical_section;
use crate::thread::ThreadId;

pub struct Kernel<P: Port> {
    port: P,
    scheduler: Scheduler,
}

impl<P: Port> Kernel<P> {
    pub const fn new(port: P, config: KernelConfig) -> Self {
        Self {
            port,
            scheduler: Scheduler::new(config),
        }
    }

    /// Initialize the kernel.
    ///
    /// Must be called before any other operation. Masks interrupts until
    /// launch, brings up the base clock and empties the pool.
    pub fn init(&mut self) {
        self.port.disable_interrupts();
        self.port.init_base_clock();
        critical_section(&self.port, |cs| self.scheduler.reset(cs));
        log::info!(
            "kernel initialized: {:?}, {} thread slots",
            self.scheduler.config().policy(),
            MAX_THREADS
        );
    }

    /// Create a new thread and append it to the ready list.
    ///
    /// # Parameters
    /// - `entry`: Thread entry function. Must never return.
    /// - `stack_size_hint`: Requested stack bytes. Reserved; every thread
    ///   gets a `STACK_WORDS` stack.
    ///
    /// # Returns
    /// - `Ok(id)`: The thread's pool slot.
    /// - `Err(KernelError::CapacityExceeded)`: The pool is full; nothing
    ///   was changed.
    pub fn register_thread(
        &mut self,
        entry: ThreadEntry,
        stack_size_hint: u32,
    ) -> Result<ThreadId, KernelError> {
        let result = critical_section(&self.port, |cs| {
            self.scheduler.register(cs, entry, stack_size_hint, P::initial_context)
        });
        match result {
            Ok(id) => log::debug!(
                "registered {} (stack hint {} bytes), {}/{} slots used",
                id,
                stack_size_hint,
                self.scheduler.pool().len(),
                MAX_THREADS
            ),
            Err(err) => log::warn!("register_thread failed: {}", err),
        }
        result
    }

    /// Arm the tick and select the ready-list head as the running thread.
    ///
    /// Returns the context to dispatch first, or `None` when no thread is
    /// registered. [`launch`](Self::launch) is this plus the first switch.
    pub fn start(&mut self) -> Option<SavedContext> {
        let reload = self.scheduler.config().tick_reload();
        critical_section(&self.port, |_cs| {
            self.port.configure_tick(reload);
            self.scheduler.start()
        })
    }

    /// Start scheduling. **Does not return.**
    ///
    /// Configures the periodic tick and switches into the first registered
    /// thread with interrupts enabled. With no threads registered the core
    /// idles forever.
    pub fn launch(&mut self) -> ! {
        match self.start() {
            Some(first) => {
                log::info!(
                    "launching {} threads, first {}",
                    self.scheduler.pool().len(),
                    self.scheduler.running()
                );
                // SAFETY: `first` was synthesized by the port on a stack
                // inside this kernel, which is never moved once launched.
                unsafe { self.port.start_first_thread(first) }
            }
            None => {
                log::warn!("launch with no registered threads, idling");
                loop {
                    self.port.wait_for_interrupt();
                }
            }
        }
    }

    /// Cooperative yield: select the successor of the running thread and
    /// request the switch. The switch happens as soon as the port's switch
    /// handler runs.
    pub fn suspend(&mut self) {
        let next = critical_section(&self.port, |_cs| self.scheduler.yield_current());
        log::trace!("{} yields to {}", self.scheduler.running(), next);
        self.port.request_switch();
    }

    /// Tick handler body: charge the running thread and request a switch
    /// on quantum expiry.
    pub fn tick(&mut self) {
        if self.scheduler.tick() {
            self.port.request_switch();
        }
    }

    /// Switch handler body: store `outgoing` for the running thread, make
    /// the pending thread current and return its context.
    pub fn switch_context(&mut self, outgoing: SavedContext) -> SavedContext {
        self.scheduler.switch_context(outgoing)
    }

    #[inline]
    pub fn running(&self) -> ThreadId {
        self.scheduler.running()
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.scheduler.pool().len()
    }

    /// Registered threads in dispatch order, starting at the head.
    pub fn ready_threads(&self) -> ready_list::Iter<'_> {
        self.scheduler.pool().ready_threads()
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    #[inline]
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

// ---------------------------------------------------------------------------
// Global kernel instance (firmware)
// ---------------------------------------------------------------------------

#[cfg(target_arch = "arm")]
use crate::arch::cortex_m4::CortexM4;

/// Global kernel instance.
///
/// # Safety
/// Accessed from thread mode only inside the kernel's own critical
/// sections, and from the SysTick and PendSV handlers, which are
/// serialized by priority and PRIMASK.
#[cfg(target_arch = "arm")]
static mut KERNEL: Kernel<CortexM4> =
    Kernel::new(CortexM4::new(), crate::config::KERNEL_CONFIG);

/// Reference to the global kernel, for the API below and the arch handlers.
///
/// # Safety
/// See [`KERNEL`]. Callers must not hold the reference across a point
/// where another context may take it.
#[cfg(target_arch = "arm")]
pub(crate) unsafe fn global() -> &'static mut Kernel<CortexM4> {
    &mut *core::ptr::addr_of_mut!(KERNEL)
}

/// Initialize the global kernel without a clock hook.
#[cfg(target_arch = "arm")]
pub fn init() {
    unsafe { global() }.init();
}

/// Initialize the global kernel, running `clock_init` to bring up the PLL.
#[cfg(target_arch = "arm")]
pub fn init_with_clock(clock_init: fn()) {
    let kernel = unsafe { global() };
    kernel.port_mut().set_clock_init(clock_init);
    kernel.init();
}

/// Register a thread with the global kernel.
#[cfg(target_arch = "arm")]
pub fn register_thread(entry: ThreadEntry, stack_size_hint: u32) -> Result<ThreadId, KernelError> {
    unsafe { global() }.register_thread(entry, stack_size_hint)
}

/// Hand SysTick and SCB to the port and start the global kernel.
/// **Does not return.**
#[cfg(target_arch = "arm")]
pub fn launch(core_peripherals: cortex_m::Peripherals) -> ! {
    let kernel = unsafe { global() };
    kernel.port().attach(core_peripherals.SYST, core_peripherals.SCB);
    kernel.launch()
}

/// Voluntarily yield the CPU from the running thread.
#[cfg(target_arch = "arm")]
pub fn suspend() {
    unsafe { global() }.suspend();
}

/// Identity of the running thread.
#[cfg(target_arch = "arm")]
pub fn current_thread() -> ThreadId {
    unsafe { global() }.running()
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimPort;
    use crate::config::{FRAME_WORDS, TIME_1MS};
    use crate::context::{InitialFrame, FRAME_BASE};

    extern "C" fn t1() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    extern "C" fn t2() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    extern "C" fn t3() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn booted(config: KernelConfig) -> Kernel<SimPort> {
        let mut kernel = Kernel::new(SimPort::new(), config);
        kernel.init();
        kernel
    }

    /// Perform the switch the port was asked for, if any.
    fn service_switch(kernel: &mut Kernel<SimPort>, ctx: &mut SavedContext) -> bool {
        if kernel.port().take_switch_request() {
            *ctx = kernel.switch_context(*ctx);
            true
        } else {
            false
        }
    }

    #[test]
    fn test_init_masks_interrupts_and_brings_up_clock() {
        let kernel = booted(KernelConfig::round_robin());
        assert!(!kernel.port().interrupts_enabled());
        assert!(kernel.port().clock_initialized());
        assert_eq!(kernel.thread_count(), 0);
    }

    #[test]
    fn test_registration_keeps_interrupts_masked_until_launch() {
        let mut kernel = booted(KernelConfig::round_robin());
        kernel.register_thread(t1, 128).unwrap();
        assert!(!kernel.port().interrupts_enabled());
    }

    #[test]
    fn test_register_synthesizes_frame() {
        let mut kernel = booted(KernelConfig::round_robin());
        let id = kernel.register_thread(t2, 128).unwrap();

        let tcb = kernel.scheduler().pool().get(id).unwrap();
        let mut top = [0u32; FRAME_WORDS];
        top.copy_from_slice(&tcb.stack.words()[FRAME_BASE..]);
        let frame = InitialFrame::from_words(&top);
        assert_eq!(frame, InitialFrame::new(t2));
        assert_eq!(
            tcb.saved.as_ptr() as *const u32,
            &tcb.stack.words()[FRAME_BASE] as *const u32
        );
    }

    #[test]
    fn test_start_arms_tick() {
        let mut kernel = booted(KernelConfig::round_robin());
        kernel.register_thread(t1, 128).unwrap();
        let first = kernel.start().unwrap();
        assert_eq!(kernel.port().tick_reload(), Some(TIME_1MS - 1));
        assert_eq!(kernel.running(), ThreadId::new(0));
        assert_eq!(first, kernel.scheduler().pool().get(ThreadId::new(0)).unwrap().saved);
    }

    #[test]
    fn test_start_without_threads() {
        let mut kernel = booted(KernelConfig::round_robin());
        assert!(kernel.start().is_none());
    }

    #[test]
    fn test_capacity_exceeded_scenario() {
        let mut kernel = booted(KernelConfig::round_robin());
        for _ in 0..MAX_THREADS {
            kernel.register_thread(t1, 128).unwrap();
        }
        assert_eq!(kernel.register_thread(t2, 128), Err(KernelError::CapacityExceeded));
        assert_eq!(kernel.thread_count(), MAX_THREADS);
        assert_eq!(kernel.ready_threads().count(), MAX_THREADS);
        assert!(kernel.scheduler().pool().is_consistent());
    }

    #[test]
    fn test_round_robin_scenario() {
        let quantum = 10;
        let mut kernel = booted(KernelConfig::round_robin().with_quantum(quantum));
        for entry in [t1, t2, t3] {
            kernel.register_thread(entry, 128).unwrap();
        }
        let mut ctx = kernel.start().unwrap();

        let mut dispatched = vec![kernel.running().index()];
        // Ticks each thread has spent running; stands in for the threads'
        // own loop counters.
        let mut counters = [0u64; 3];
        for _ in 0..(quantum - 1) * 3 * 20 {
            counters[kernel.running().index()] += 1;
            kernel.tick();
            if service_switch(&mut kernel, &mut ctx) {
                dispatched.push(kernel.running().index());
            }
            let max = counters.iter().max().unwrap();
            let min = counters.iter().min().unwrap();
            assert!(max - min <= u64::from(quantum - 1));
            // Whole slices per thread never differ by more than one.
            let slices = counters.map(|c| c / u64::from(quantum - 1));
            let max = slices.iter().max().unwrap();
            let min = slices.iter().min().unwrap();
            assert!(max - min <= 1);
        }

        let expected: Vec<usize> =
            [0, 1, 2].iter().cycle().copied().take(dispatched.len()).collect();
        assert_eq!(dispatched, expected);
        assert_eq!(dispatched.len(), 61);
        let slices = counters.map(|c| c / u64::from(quantum - 1));
        assert_eq!(slices, [20, 20, 20]);
    }

    #[test]
    fn test_cooperative_scenario() {
        let mut kernel = booted(KernelConfig::cooperative());
        for entry in [t1, t2, t3] {
            kernel.register_thread(entry, 128).unwrap();
        }
        let mut ctx = kernel.start().unwrap();

        // A thread that never yields keeps the CPU.
        for _ in 0..1_000 {
            kernel.tick();
            assert!(!service_switch(&mut kernel, &mut ctx));
        }
        assert_eq!(kernel.running(), ThreadId::new(0));

        // Each yield hands the CPU straight to the successor.
        for expected in [1, 2, 0, 1, 2, 0] {
            kernel.suspend();
            assert!(kernel.port().switch_requested());
            assert!(service_switch(&mut kernel, &mut ctx));
            assert_eq!(kernel.running().index(), expected);
        }
    }

    #[test]
    fn test_yield_in_round_robin_keeps_quantum() {
        let mut kernel = booted(KernelConfig::round_robin().with_quantum(5));
        kernel.register_thread(t1, 128).unwrap();
        kernel.register_thread(t2, 128).unwrap();
        let mut ctx = kernel.start().unwrap();

        kernel.tick();
        kernel.suspend();
        service_switch(&mut kernel, &mut ctx);
        assert_eq!(kernel.running(), ThreadId::new(1));
        let first = kernel.scheduler().pool().get(ThreadId::new(0)).unwrap();
        assert_eq!(first.quantum_remaining, 3);
    }

    #[test]
    fn test_degenerate_quantum_still_rotates() {
        for ticks in [0, 1] {
            let mut kernel = booted(KernelConfig::round_robin().with_quantum(ticks));
            let id = kernel.register_thread(t1, 128).unwrap();
            kernel.register_thread(t2, 128).unwrap();
            assert_eq!(kernel.scheduler().pool().get(id).unwrap().quantum_remaining, 1);

            let mut ctx = kernel.start().unwrap();
            for expected in [1, 0, 1, 0] {
                kernel.tick();
                assert!(service_switch(&mut kernel, &mut ctx));
                assert_eq!(kernel.running().index(), expected);
            }
        }
    }

    #[test]
    fn test_init_resets_previous_registrations() {
        let mut kernel = booted(KernelConfig::round_robin());
        kernel.register_thread(t1, 128).unwrap();
        kernel.register_thread(t2, 128).unwrap();
        kernel.init();
        assert_eq!(kernel.thread_count(), 0);
        assert_eq!(kernel.register_thread(t3, 128).unwrap(), ThreadId::new(0));
    }
}
