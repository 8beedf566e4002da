//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//! Implements context switching via PendSV, SysTick timer configuration,
//! and interrupt management.
//!
//! ## Context Switch Mechanism
//!
//! The Cortex-M4 uses a split-stack model:
//! - **MSP** (Main Stack Pointer): Used by the kernel and interrupt handlers
//! - **PSP** (Process Stack Pointer): Used by threads in Thread mode
//!
//! On exception entry, the hardware automatically stacks R0–R3, R12, LR, PC,
//! and xPSR onto the process stack. The PendSV handler manually saves and
//! restores R4–R11, which completes the full context save/restore. Both a
//! voluntary `suspend()` and a quantum expiry end up in the same handler, so
//! a thread cannot tell which one switched it out.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: level 2, tick accounting, preempts the switch handler
//! - PendSV: level 7 (lowest), runs once every other handler has finished
//!
//! PendSV additionally masks interrupts for its own duration so a tick
//! cannot change the pending selection halfway through a transfer.

use core::arch::{asm, naked_asm};
use core::cell::RefCell;

use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use cortex_m::register::primask;

use crate::arch::Port;
use crate::config::{PENDSV_PRIORITY, SYSTICK_PRIORITY};
use crate::context::{self, SavedContext, ThreadEntry};
use crate::sync::{InterruptMask, RestoreToken};
use crate::thread::Stack;

/// Core peripherals owned by the port once attached.
struct TickPeripherals {
    syst: SYST,
    scb: SCB,
}

pub struct CortexM4 {
    tick: Mutex<RefCell<Option<TickPeripherals>>>,
    clock_init: Option<fn()>,
}

impl CortexM4 {
    pub const fn new() -> Self {
        Self {
            tick: Mutex::new(RefCell::new(None)),
            clock_init: None,
        }
    }

    /// Hand over the SysTick and SCB peripherals used by `configure_tick`.
    pub fn attach(&self, syst: SYST, scb: SCB) {
        interrupt::free(|cs| {
            self.tick
                .borrow(cs)
                .replace(Some(TickPeripherals { syst, scb }));
        });
    }

    /// Board hook that brings the PLL up to `SYSTEM_CLOCK_HZ`.
    pub fn set_clock_init(&mut self, clock_init: fn()) {
        self.clock_init = Some(clock_init);
    }
}

impl Default for CortexM4 {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptMask for CortexM4 {
    #[inline]
    fn acquire(&self) -> RestoreToken {
        let was_enabled = primask::read().is_inactive();
        interrupt::disable();
        RestoreToken::new(was_enabled)
    }

    #[inline]
    unsafe fn release(&self, token: RestoreToken) {
        if token.was_enabled() {
            interrupt::enable();
        }
    }
}

impl Port for CortexM4 {
    #[inline]
    fn disable_interrupts(&self) {
        interrupt::disable();
    }

    fn init_base_clock(&self) {
        match self.clock_init {
            Some(clock_init) => clock_init(),
            None => log::warn!("no clock hook installed, running on reset clock"),
        }
    }

    /// Configure SysTick and the SysTick/PendSV priorities.
    fn configure_tick(&self, reload: u32) {
        let armed = interrupt::free(|cs| {
            let mut tick = self.tick.borrow(cs).borrow_mut();
            let Some(tick) = tick.as_mut() else {
                return false;
            };
            tick.syst.disable_counter();
            tick.syst.set_clock_source(SystClkSource::Core);
            tick.syst.set_reload(reload);
            tick.syst.clear_current();
            // SAFETY: priorities are set once, before any thread runs.
            unsafe {
                tick.scb.set_priority(SystemHandler::SysTick, SYSTICK_PRIORITY);
                tick.scb.set_priority(SystemHandler::PendSV, PENDSV_PRIORITY);
            }
            tick.syst.enable_interrupt();
            tick.syst.enable_counter();
            true
        });
        if !armed {
            log::error!("SysTick not attached, scheduler tick disabled");
        }
    }

    /// Trigger a PendSV exception to perform a context switch.
    #[inline]
    fn request_switch(&self) {
        SCB::set_pendsv();
    }

    fn initial_context(entry: ThreadEntry, stack: &mut Stack) -> SavedContext {
        context::synthesize_initial_frame(entry, stack)
    }

    /// Start the first thread by switching to PSP and branching to Thread
    /// mode. The frame is unstacked by hand since there is no exception to
    /// return from, so the thread starts with the same register image a
    /// PendSV resume would give it.
    unsafe fn start_first_thread(&self, first: SavedContext) -> ! {
        asm!(
            // Software-saved part of the frame
            "ldmia r0!, {{r4-r11}}",
            "msr psp, r0",

            // Thread mode uses PSP (CONTROL.SPSEL = 1)
            "movs r0, #2",
            "msr control, r0",
            "isb",

            // PC with the Thumb bit goes into the discarded xPSR slot
            "ldr r0, [sp, #24]",
            "orr r0, r0, #1",
            "str r0, [sp, #28]",

            // Hardware part: r0-r3, r12, LR sentinel, then skip the raw PC
            "pop {{r0-r3, r12, lr}}",
            "add sp, sp, #4",

            "cpsie i",
            "pop {{pc}}",
            in("r0") first.as_ptr(),
            options(noreturn)
        );
    }

    #[inline]
    fn wait_for_interrupt(&self) {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler. Performs the actual context switch.
///
/// ## Sequence
/// 1. Mask interrupts
/// 2. Save R4–R11 onto the running thread's stack (PSP)
/// 3. Hand the updated PSP to the kernel, which stores it, commits the
///    pending selection and returns the incoming thread's PSP
/// 4. Restore R4–R11 from the incoming stack and load PSP
/// 5. Unmask and return from exception (hardware restores the rest)
///
/// # Safety
/// Naked handler called directly by the NVIC. Must follow the exact
/// exception entry/exit convention and only touch R0–R3, R12 before
/// the save.
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",

        // --- Save outgoing context ---
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",

        // EXC_RETURN lives in LR; r1 keeps MSP 8-byte aligned
        "push {{r1, lr}}",
        "bl {switch}",
        "pop {{r1, lr}}",

        // --- Restore incoming context ---
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",

        "cpsie i",
        "bx lr",
        switch = sym switch_context,
    );
}

/// Store the outgoing PSP and return the incoming one. Called from PendSV
/// with interrupts masked.
unsafe extern "C" fn switch_context(psp: *mut u32) -> *mut u32 {
    crate::kernel::global()
        .switch_context(SavedContext::from_raw(psp))
        .as_ptr()
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler: scheduler tick entry point.
///
/// Charges the running thread and pends PendSV on quantum expiry.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn SysTick() {
    crate::kernel::global().tick();
}
