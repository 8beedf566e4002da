//! # Host Simulation Port
//!
//! Stands in for the hardware on the build host. Interrupt masking, switch
//! requests and timer setup are recorded in plain cells so tests can drive
//! the kernel tick by tick and perform switches themselves. Frames use the
//! Cortex-M layout, so the stacks tests inspect match the target's.

use core::cell::Cell;

use crate::arch::Port;
use crate::context::{self, SavedContext, ThreadEntry};
use crate::sync::{InterruptMask, RestoreToken};
use crate::thread::Stack;

#[derive(Debug)]
pub struct SimPort {
    interrupts_enabled: Cell<bool>,
    switch_requested: Cell<bool>,
    clock_initialized: Cell<bool>,
    tick_reload: Cell<Option<u32>>,
}

impl SimPort {
    pub const fn new() -> Self {
        Self {
            interrupts_enabled: Cell::new(true),
            switch_requested: Cell::new(false),
            clock_initialized: Cell::new(false),
            tick_reload: Cell::new(None),
        }
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled.get()
    }

    pub fn set_interrupts_enabled(&self, enabled: bool) {
        self.interrupts_enabled.set(enabled);
    }

    /// Consume a pending switch request, as the PendSV handler would.
    pub fn take_switch_request(&self) -> bool {
        self.switch_requested.replace(false)
    }

    pub fn switch_requested(&self) -> bool {
        self.switch_requested.get()
    }

    pub fn clock_initialized(&self) -> bool {
        self.clock_initialized.get()
    }

    /// Reload value given to `configure_tick`, if the timer was armed.
    pub fn tick_reload(&self) -> Option<u32> {
        self.tick_reload.get()
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptMask for SimPort {
    fn acquire(&self) -> RestoreToken {
        RestoreToken::new(self.interrupts_enabled.replace(false))
    }

    unsafe fn release(&self, token: RestoreToken) {
        self.interrupts_enabled.set(token.was_enabled());
    }
}

impl Port for SimPort {
    fn disable_interrupts(&self) {
        self.interrupts_enabled.set(false);
    }

    fn init_base_clock(&self) {
        self.clock_initialized.set(true);
    }

    fn configure_tick(&self, reload: u32) {
        self.tick_reload.set(Some(reload));
    }

    fn request_switch(&self) {
        self.switch_requested.set(true);
    }

    fn initial_context(entry: ThreadEntry, stack: &mut Stack) -> SavedContext {
        context::synthesize_initial_frame(entry, stack)
    }

    unsafe fn start_first_thread(&self, first: SavedContext) -> ! {
        panic!("simulation port cannot enter thread mode (context {:?})", first)
    }

    fn wait_for_interrupt(&self) {
        core::hint::spin_loop();
    }
}
