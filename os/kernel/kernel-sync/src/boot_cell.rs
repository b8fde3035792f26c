use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// A `static` slot whose contents can be mutably borrowed exactly once.
///
/// ```rust
/// use kernel_sync::BootCell;
///
/// static COUNTER: BootCell<u32> = BootCell::new(0);
///
/// let counter = COUNTER.claim().unwrap();
/// *counter += 1;
/// assert!(COUNTER.claim().is_none());
/// ```
pub struct BootCell<T> {
    claimed: AtomicBool,
    value: UnsafeCell<T>,
}

impl<T> BootCell<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Take the unique mutable reference. Only the first call succeeds.
    #[must_use]
    pub fn claim(&'static self) -> Option<&'static mut T> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        // SAFETY: the flag flips exactly once, so this is the only reference.
        Some(unsafe { &mut *self.value.get() })
    }

    /// Whether [`claim`](Self::claim) has already succeeded.
    #[inline]
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Relaxed)
    }
}

// Safety: the value is reachable from at most one context, after `claim`.
unsafe impl<T: Send> Sync for BootCell<T> {}
