//! # Execution Context
//!
//! The portable half of the context-switch protocol: the opaque saved
//! state stored in every thread record, and the synthesis of the initial
//! frame that lets a never-run thread be dispatched through the same
//! restore path as a preempted one.
//!
//! ## Stack Layout (top = high address, growing down)
//!
//! ```text
//! [Hardware stacked frame]
//!   xPSR  0x01000000 (Thumb bit)
//!   PC    entry point
//!   LR    0x14141414
//!   R12   0x12121212
//!   R3    0x03030303
//!   R2    0x02020202
//!   R1    0x01010101
//!   R0    0x00000000
//! [Software saved context]
//!   R11   0x11111111
//!   R10   0x10101010
//!   R9    0x09090909
//!   R8    0x08080808
//!   R7    0x07070707
//!   R6    0x06060606
//!   R5    0x05050505
//!   R4    0x04040404   <- saved stack pointer after synthesis
//! ```
//!
//! Each general-purpose slot holds a distinct sentinel so that a register
//! restored from the wrong place is obvious in a debugger.

use static_assertions::assert_eq_size;

use crate::config::{FRAME_WORDS, STACK_WORDS};
use crate::thread::Stack;

/// Thread entry point. Takes no arguments and must never return.
pub type ThreadEntry = extern "C" fn() -> !;

/// xPSR with only the Thumb state bit set.
pub const XPSR_THUMB: u32 = 0x0100_0000;

/// Link-register sentinel. A thread entry that returns branches here and
/// faults at a recognisable address.
pub const LR_SENTINEL: u32 = 0x1414_1414;

/// Saved stack pointer of a thread that is not running.
///
/// Points at the R4 slot of the frame on the thread's own stack. Only the
/// architecture port dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SavedContext(*mut u32);

impl SavedContext {
    /// No saved state (slot never registered).
    pub const fn null() -> Self {
        Self(core::ptr::null_mut())
    }

    /// Wrap a process stack pointer handed over by the switch handler.
    #[inline]
    pub const fn from_raw(sp: *mut u32) -> Self {
        Self(sp)
    }

    #[inline]
    pub const fn as_ptr(self) -> *mut u32 {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Register image written to the top of a fresh stack, in memory order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialFrame {
    // Software-saved (restored by the switch handler)
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
    // Hardware-stacked (restored on exception return)
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

assert_eq_size!(InitialFrame, [u32; FRAME_WORDS]);

impl InitialFrame {
    /// Sentinel-filled frame that resumes at `entry`.
    pub fn new(entry: ThreadEntry) -> Self {
        Self {
            r4: 0x0404_0404,
            r5: 0x0505_0505,
            r6: 0x0606_0606,
            r7: 0x0707_0707,
            r8: 0x0808_0808,
            r9: 0x0909_0909,
            r10: 0x1010_1010,
            r11: 0x1111_1111,
            r0: 0x0000_0000,
            r1: 0x0101_0101,
            r2: 0x0202_0202,
            r3: 0x0303_0303,
            r12: 0x1212_1212,
            lr: LR_SENTINEL,
            // Exception return wants bit 0 clear; the first-dispatch path
            // sets it again before branching.
            pc: (entry as usize as u32) & !1,
            xpsr: XPSR_THUMB,
        }
    }

    /// Frame as stack words, lowest address first.
    pub fn to_words(&self) -> [u32; FRAME_WORDS] {
        [
            self.r4, self.r5, self.r6, self.r7, self.r8, self.r9, self.r10, self.r11,
            self.r0, self.r1, self.r2, self.r3, self.r12, self.lr, self.pc, self.xpsr,
        ]
    }

    /// Decode a frame from stack words, lowest address first.
    pub fn from_words(w: &[u32; FRAME_WORDS]) -> Self {
        Self {
            r4: w[0],
            r5: w[1],
            r6: w[2],
            r7: w[3],
            r8: w[4],
            r9: w[5],
            r10: w[6],
            r11: w[7],
            r0: w[8],
            r1: w[9],
            r2: w[10],
            r3: w[11],
            r12: w[12],
            lr: w[13],
            pc: w[14],
            xpsr: w[15],
        }
    }
}

/// Index of the first frame word (R4) within a stack.
pub const FRAME_BASE: usize = STACK_WORDS - FRAME_WORDS;

/// Write an initial frame for `entry` at the top of `stack` and return the
/// saved context that resumes it.
pub fn synthesize_initial_frame(entry: ThreadEntry, stack: &mut Stack) -> SavedContext {
    let words = stack.words_mut();
    words[FRAME_BASE..].copy_from_slice(&InitialFrame::new(entry).to_words());
    SavedContext::from_raw(&mut words[FRAME_BASE] as *mut u32)
}
