//! # RROS Configuration
//!
//! Compile-time constants governing the thread pool, the tick timer and
//! the scheduling policy. All limits are fixed at compile time; no dynamic
//! allocation.

use static_assertions::const_assert;

/// Maximum number of threads the pool can hold. Bounds the static TCB array;
/// each thread consumes `STACK_WORDS * 4` bytes of RAM for its stack.
pub const MAX_THREADS: usize = 8;

/// Per-thread stack size in 32-bit words. Must hold the deepest call chain
/// plus the 16-word initial frame (hardware exception frame and R4–R11).
pub const STACK_WORDS: usize = 512;

/// Number of words in a synthesized initial frame.
pub const FRAME_WORDS: usize = 16;

/// Core clock after the base-clock initializer has run (PLL at 80 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 80_000_000;

/// SysTick frequency in Hz. One tick is the unit of quantum accounting.
pub const TICK_HZ: u32 = 1_000;

/// Core clock cycles in one millisecond tick.
pub const TIME_1MS: u32 = SYSTEM_CLOCK_HZ / TICK_HZ;

/// Round-robin timeout in ticks: how long a thread executes before a
/// forced switch.
pub const ROUND_ROBIN_QUANTUM: u32 = 250;

/// SysTick exception priority (3 implemented priority bits, level 2).
pub const SYSTICK_PRIORITY: u8 = 2 << 5;

/// PendSV exception priority (level 7, the least urgent). Context transfer
/// runs only after tick accounting and every other handler has finished.
pub const PENDSV_PRIORITY: u8 = 7 << 5;

/// Largest value the 24-bit SysTick reload register accepts.
pub const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

const_assert!(MAX_THREADS > 0);
const_assert!(STACK_WORDS >= FRAME_WORDS);
// Keeps the top of every stack 8-byte aligned (AAPCS).
const_assert!(STACK_WORDS % 2 == 0);
const_assert!(TIME_1MS - 1 <= SYSTICK_MAX_RELOAD);
const_assert!(ROUND_ROBIN_QUANTUM >= 2);
const_assert!(PENDSV_PRIORITY > SYSTICK_PRIORITY);

// ---------------------------------------------------------------------------
// Kernel configuration
// ---------------------------------------------------------------------------

/// How the scheduler decides when to hand the CPU to the next thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Switches happen only when the running thread calls `suspend()`.
    /// A thread that never yields runs forever.
    Cooperative,
    /// Every tick charges the running thread; quantum expiry forces a
    /// switch to its successor.
    RoundRobin,
}

/// Configuration fixed when the kernel value is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    policy: SchedulingPolicy,
    quantum_ticks: u32,
    tick_reload: u32,
}

impl KernelConfig {
    /// Yield-only scheduling with the default tick.
    pub const fn cooperative() -> Self {
        Self {
            policy: SchedulingPolicy::Cooperative,
            quantum_ticks: ROUND_ROBIN_QUANTUM,
            tick_reload: TIME_1MS - 1,
        }
    }

    /// Quantum-based preemption with `ROUND_ROBIN_QUANTUM` ticks per slice.
    pub const fn round_robin() -> Self {
        Self {
            policy: SchedulingPolicy::RoundRobin,
            quantum_ticks: ROUND_ROBIN_QUANTUM,
            tick_reload: TIME_1MS - 1,
        }
    }

    /// Override the quantum length. Values below 2 are raised to 2 so the
    /// reload value `quantum - 1` is never zero.
    pub const fn with_quantum(mut self, ticks: u32) -> Self {
        self.quantum_ticks = if ticks < 2 { 2 } else { ticks };
        self
    }

    /// Selection policy shared by every thread.
    #[inline]
    pub const fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Ticks per quantum (round-robin only). Never below 2.
    #[inline]
    pub const fn quantum_ticks(&self) -> u32 {
        self.quantum_ticks
    }

    /// SysTick reload value: core cycles per tick minus one.
    #[inline]
    pub const fn tick_reload(&self) -> u32 {
        self.tick_reload
    }

    /// Value loaded into `quantum_remaining` at registration and on expiry.
    #[inline]
    pub const fn quantum_reload(&self) -> u32 {
        let ticks = if self.quantum_ticks < 2 { 2 } else { self.quantum_ticks };
        ticks - 1
    }
}

/// Configuration of the firmware's global kernel instance. The
/// `cooperative` feature selects yield-only scheduling.
#[cfg(feature = "cooperative")]
pub const KERNEL_CONFIG: KernelConfig = KernelConfig::cooperative();
#[cfg(not(feature = "cooperative"))]
pub const KERNEL_CONFIG: KernelConfig = KernelConfig::round_robin();

impl Default for KernelConfig {
    fn default() -> Self {
        Self::round_robin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_reload_matches_one_millisecond() {
        let config = KernelConfig::round_robin();
        assert_eq!(config.tick_reload(), 79_999);
        assert!(config.tick_reload() <= SYSTICK_MAX_RELOAD);
    }

    #[test]
    fn test_quantum_clamped() {
        for ticks in [0, 1, 2] {
            let config = KernelConfig::round_robin().with_quantum(ticks);
            assert_eq!(config.quantum_ticks(), 2);
            assert_eq!(config.quantum_reload(), 1);
        }

        let raw = KernelConfig { quantum_ticks: 0, ..KernelConfig::round_robin() };
        assert_eq!(raw.quantum_reload(), 1);

        let config = KernelConfig::cooperative().with_quantum(10);
        assert_eq!(config.quantum_reload(), 9);
        assert_eq!(config.policy(), SchedulingPolicy::Cooperative);
    }

    #[test]
    fn test_default_is_round_robin() {
        let config = KernelConfig::default();
        assert_eq!(config.policy(), SchedulingPolicy::RoundRobin);
        assert_eq!(config.quantum_reload(), ROUND_ROBIN_QUANTUM - 1);
    }
}
