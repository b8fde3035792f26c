//! # Memory Layout

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Size of one physical frame and of one mapped page.
pub const PAGE_SIZE: u32 = 4096;

/// Start of extended memory; the boot loader places the kernel image here.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker (LMA).
pub const EXTMEM: u32 = 0x0010_0000; // 1 MiB

/// Top of usable physical memory.
pub const PHYSTOP: u32 = 0x0E00_0000; // 224 MiB

/// Other devices (I/O APIC, LAPIC, ...) live at high physical addresses and
/// are mapped 1:1 from here up to the end of the 4 GiB space.
pub const DEVSPACE: u32 = 0xFE00_0000;

/// First kernel virtual address. All physical memory below [`PHYSTOP`] is
/// visible at `KERNBASE + pa` (the direct map).
pub const KERNBASE: u32 = 0xF000_0000;

/// Where the kernel executes (VMA), matches the linker script.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const KERNLINK: u32 = KERNBASE + EXTMEM;

/// Physical memory reachable through the boot stub's 4 MiB mapping.
///
/// Frames below this address may be handed to the allocator before the full
/// kernel address space is active.
pub const BOOT_MAPPED_TOP: u32 = 0x0040_0000; // 4 MiB

const _: () = {
    assert!(EXTMEM.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP.is_multiple_of(PAGE_SIZE));
    assert!(DEVSPACE.is_multiple_of(PAGE_SIZE));
    assert!(KERNBASE.is_multiple_of(PAGE_SIZE));
    assert!(BOOT_MAPPED_TOP.is_multiple_of(PAGE_SIZE));
    assert!(EXTMEM < BOOT_MAPPED_TOP);
    assert!(BOOT_MAPPED_TOP <= PHYSTOP);
    assert!(PHYSTOP <= DEVSPACE - KERNBASE);
};

/// Direct-mapped alias of a physical address (`pa + KERNBASE`).
///
/// Returns `None` when `pa` lies outside the direct map, i.e. at or above
/// [`PHYSTOP`].
#[inline]
#[must_use]
pub const fn p2v(pa: PhysicalAddress) -> Option<VirtualAddress> {
    if pa.as_u32() >= PHYSTOP {
        return None;
    }
    Some(VirtualAddress::new(pa.as_u32() + KERNBASE))
}

/// Physical address behind a direct-mapped kernel virtual address
/// (`va - KERNBASE`).
///
/// Returns `None` for addresses below [`KERNBASE`].
#[inline]
#[must_use]
pub const fn v2p(va: VirtualAddress) -> Option<PhysicalAddress> {
    match va.as_u32().checked_sub(KERNBASE) {
        Some(pa) => Some(PhysicalAddress::new(pa)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_map_round_trip() {
        let pa = PhysicalAddress::new(0x0012_3456);
        let va = p2v(pa).unwrap();
        assert_eq!(va.as_u32(), 0xF012_3456);
        assert_eq!(v2p(va), Some(pa));
    }

    #[test]
    fn direct_map_bounds() {
        assert!(p2v(PhysicalAddress::new(PHYSTOP)).is_none());
        assert!(p2v(PhysicalAddress::new(PHYSTOP - 1)).is_some());
        assert!(v2p(VirtualAddress::new(KERNBASE - 1)).is_none());
        assert_eq!(
            v2p(VirtualAddress::new(KERNLINK)),
            Some(PhysicalAddress::new(EXTMEM))
        );
    }
}
