//! Kernel error type.

use core::fmt;

/// Recoverable failures reported by the kernel API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Every pool slot already holds a valid thread. Nothing was changed.
    CapacityExceeded,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::CapacityExceeded => f.write_str("thread pool capacity exceeded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            KernelError::CapacityExceeded.to_string(),
            "thread pool capacity exceeded"
        );
    }
}
