//! # Synchronization Primitives
//!
//! Interrupt masking is the only mutual-exclusion mechanism in the kernel.
//! All thread-pool and ready-list mutation happens inside a
//! [`CriticalSection`], which masks interrupts on entry and restores the
//! mask state captured at entry when it is dropped. Restoring (rather than
//! unconditionally unmasking) makes nested sections safe: the inner release
//! leaves interrupts masked because they were masked when it acquired.
//!
//! # Usage
//! ```ignore
//! sync::critical_section(&port, |cs| {
//!     scheduler.register(cs, entry, stack_hint, P::initial_context)
//! })?;
//! ```

use core::marker::PhantomData;

/// Interrupt-mask state captured by [`InterruptMask::acquire`].
///
/// Opaque to the kernel: it is only ever handed back to the same mask's
/// `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreToken {
    was_enabled: bool,
}

impl RestoreToken {
    /// Token recording whether interrupts were enabled before acquisition.
    #[inline]
    pub const fn new(was_enabled: bool) -> Self {
        Self { was_enabled }
    }

    /// Whether interrupts were enabled when the token was taken.
    #[inline]
    pub const fn was_enabled(self) -> bool {
        self.was_enabled
    }
}

/// Hardware-facing interrupt enable/disable capability.
pub trait InterruptMask {
    /// Mask interrupts and return the state that existed beforehand.
    fn acquire(&self) -> RestoreToken;

    /// Restore exactly the state captured in `token`.
    ///
    /// # Safety
    /// `token` must come from the matching `acquire` on this mask, and
    /// releases must happen in reverse order of acquisition.
    unsafe fn release(&self, token: RestoreToken);
}

/// Scoped critical section. Interrupts stay masked until it is dropped,
/// including on early `return` and `?` paths.
///
/// Functions that mutate shared kernel state take `&CriticalSection` as a
/// proof that they run with interrupts masked.
pub struct CriticalSection<'a, M: InterruptMask + ?Sized> {
    mask: &'a M,
    token: RestoreToken,
    // Not Send: the token belongs to the context that acquired it.
    _not_send: PhantomData<*const ()>,
}

impl<'a, M: InterruptMask + ?Sized> CriticalSection<'a, M> {
    /// Mask interrupts and remember the previous state.
    #[inline]
    pub fn enter(mask: &'a M) -> Self {
        let token = mask.acquire();
        Self {
            mask,
            token,
            _not_send: PhantomData,
        }
    }

    /// State that will be restored on drop.
    #[inline]
    pub fn token(&self) -> RestoreToken {
        self.token
    }
}

impl<M: InterruptMask + ?Sized> Drop for CriticalSection<'_, M> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the token was produced by `enter` on the same mask, and
        // scoped guards drop in reverse order of creation.
        unsafe { self.mask.release(self.token) }
    }
}

/// Execute a closure within a critical section (interrupts masked).
///
/// Keep critical sections as short as possible to bound interrupt latency.
#[inline]
pub fn critical_section<M, F, R>(mask: &M, f: F) -> R
where
    M: InterruptMask + ?Sized,
    F: FnOnce(&CriticalSection<'_, M>) -> R,
{
    let cs = CriticalSection::enter(mask);
    f(&cs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimPort;
    use proptest::prelude::*;

    #[test]
    fn test_guard_masks_and_restores() {
        let port = SimPort::new();
        assert!(port.interrupts_enabled());
        {
            let cs = CriticalSection::enter(&port);
            assert!(!port.interrupts_enabled());
            assert!(cs.token().was_enabled());
        }
        assert!(port.interrupts_enabled());
    }

    #[test]
    fn test_release_keeps_prior_mask() {
        let port = SimPort::new();
        port.set_interrupts_enabled(false);
        critical_section(&port, |cs| {
            assert!(!cs.token().was_enabled());
        });
        // Must not unmask interrupts that were masked before entry.
        assert!(!port.interrupts_enabled());
    }

    #[test]
    fn test_nested_sections() {
        let port = SimPort::new();
        critical_section(&port, |_outer| {
            critical_section(&port, |inner| {
                assert!(!inner.token().was_enabled());
            });
            assert!(!port.interrupts_enabled());
        });
        assert!(port.interrupts_enabled());
    }

    #[test]
    fn test_released_on_early_return() {
        fn bail(port: &SimPort, fail: bool) -> Result<(), ()> {
            let _cs = CriticalSection::enter(port);
            if fail {
                return Err(());
            }
            Ok(())
        }
        let port = SimPort::new();
        assert!(bail(&port, true).is_err());
        assert!(port.interrupts_enabled());
        assert!(bail(&port, false).is_ok());
        assert!(port.interrupts_enabled());
    }

    fn nest(port: &SimPort, depth: usize) {
        if depth == 0 {
            assert!(!port.interrupts_enabled());
            return;
        }
        let _cs = CriticalSection::enter(port);
        nest(port, depth - 1);
    }

    proptest! {
        #[test]
        fn prop_nesting_restores_initial_state(depth in 1usize..16, enabled in any::<bool>()) {
            let port = SimPort::new();
            port.set_interrupts_enabled(enabled);
            nest(&port, depth);
            prop_assert_eq!(port.interrupts_enabled(), enabled);
        }
    }
}
