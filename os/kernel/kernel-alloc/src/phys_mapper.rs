//! # Direct-Map `PhysMapper` for the Kernel
//!
//! Every physical address below [`PHYSTOP`] is visible at `KERNBASE + pa` once
//! either the boot mapping (first 4 MiB) or the full kernel address space is
//! active. [`KernelPhysMapper`] turns a physical address into a reference
//! through that window.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::KernelPhysMapper;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let va = KernelPhysMapper::virt(PhysicalAddress::new(0x0012_3000));
//! assert_eq!(va.as_u32(), 0xF012_3000);
//! ```

use kernel_info::memory::{PHYSTOP, p2v};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{PhysMapper, Violation, fatal};

/// [`PhysMapper`] for the kernel's direct map at [`KERNBASE`](kernel_info::memory::KERNBASE).
///
/// # Safety
/// - The direct map must be present and cover the referenced physical range.
/// - The returned reference must only be used for valid, mapped, and writable memory.
#[derive(Debug, Copy, Clone, Default)]
pub struct KernelPhysMapper;

impl KernelPhysMapper {
    /// Direct-mapped alias of `pa`.
    ///
    /// # Panics
    /// Through [`fatal`] if `pa` is at or above [`PHYSTOP`].
    #[must_use]
    #[track_caller]
    pub fn virt(pa: PhysicalAddress) -> VirtualAddress {
        match p2v(pa) {
            Some(va) => va,
            None => fatal(Violation::NotDirectMapped(pa)),
        }
    }
}

impl PhysMapper for KernelPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = Self::virt(pa).as_u32() as usize as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via the direct map.
        unsafe { &mut *va }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_is_kernbase_offset() {
        assert_eq!(KernelPhysMapper::virt(PhysicalAddress::zero()).as_u32(), 0xF000_0000);
        assert_eq!(
            KernelPhysMapper::virt(PhysicalAddress::new(PHYSTOP - 1)).as_u32(),
            0xFDFF_FFFF
        );
    }

    #[test]
    #[should_panic(expected = "outside the kernel's direct map")]
    fn device_space_has_no_alias() {
        let _ = KernelPhysMapper::virt(PhysicalAddress::new(0xFEE0_0000));
    }
}
