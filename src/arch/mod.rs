//! # Architecture Abstraction Layer
//!
//! Provides the hardware boundary for the kernel. Everything the scheduler
//! needs from the CPU goes through [`Port`]: interrupt masking, the periodic
//! tick, pending a context switch, synthesizing a first frame and entering
//! the first thread.
//!
//! - [`cortex_m4`]: ARMv7E-M port (PendSV + SysTick), built for `arm` targets.
//! - [`sim`]: host simulation port used by the unit tests.

use crate::context::{SavedContext, ThreadEntry};
use crate::sync::InterruptMask;
use crate::thread::Stack;

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(not(target_arch = "arm"))]
pub mod sim;

/// Capabilities the kernel consumes from the target.
///
/// All methods take `&self` so they can be called while a
/// [`CriticalSection`](crate::sync::CriticalSection) borrows the port.
pub trait Port: InterruptMask {
    /// Mask interrupts unconditionally. Used by `init` so nothing fires
    /// until launch.
    fn disable_interrupts(&self);

    /// Bring the core clock to `SYSTEM_CLOCK_HZ`.
    fn init_base_clock(&self);

    /// Arm the periodic tick with `reload` core cycles per tick and set the
    /// tick handler above the context-switch handler in urgency.
    fn configure_tick(&self, reload: u32);

    /// Ask for a context switch at the next safe interrupt-return point.
    fn request_switch(&self);

    /// Synthesize the first frame of a thread on its stack.
    fn initial_context(entry: ThreadEntry, stack: &mut Stack) -> SavedContext;

    /// Restore `first` and run it in thread mode with interrupts enabled.
    ///
    /// # Safety
    /// `first` must come from `initial_context` on a stack that stays in
    /// place for the life of the system.
    unsafe fn start_first_thread(&self, first: SavedContext) -> !;

    /// Sleep until the next interrupt.
    fn wait_for_interrupt(&self);
}
