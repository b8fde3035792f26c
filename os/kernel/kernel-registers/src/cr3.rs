#[cfg(all(feature = "asm", target_arch = "x86"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// CR3: Page-Directory Base Register (32-bit paging, PAE disabled).
///
/// Holds the physical base address of the page directory and cache-control
/// flags for directory accesses. Loading it flushes all non-global TLB entries.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Cr3 {
    /// Bits 0–2: Ignored.
    #[bits(3)]
    pub reserved0: u8,

    /// Bit 3: PWT: Page-level Write-Through for the page directory.
    pub pwt: bool,

    /// Bit 4: PCD: Page-level Cache Disable for the page directory.
    pub pcd: bool,

    /// Bits 5–11: Ignored.
    #[bits(7)]
    pub reserved1: u8,

    /// Bits 12–31: page directory physical base >> 12.
    #[bits(20)]
    page_directory_4k: u32,
}

impl Cr3 {
    /// Create a `Cr3` value for the page directory stored in `frame`.
    #[must_use]
    pub const fn from_page_directory(frame: PhysicalPage<Size4K>, pwt: bool, pcd: bool) -> Self {
        Self::new()
            .with_pwt(pwt)
            .with_pcd(pcd)
            .with_page_directory_4k(frame.number())
    }

    /// Physical address of the page directory.
    #[must_use]
    pub const fn page_directory(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.page_directory_4k() << 12)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u32;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_directory_base_bit_exact() {
        let frame = PhysicalAddress::new(0x0035_F000).page::<Size4K>();
        let cr3 = Cr3::from_page_directory(frame, false, false);
        assert_eq!(cr3.into_bits(), 0x0035_F000);
        assert_eq!(cr3.page_directory(), frame.base());
    }

    #[test]
    fn cache_control_bits() {
        let frame = PhysicalAddress::new(0x0010_0000).page::<Size4K>();
        let cr3 = Cr3::from_page_directory(frame, true, true);
        assert_eq!(cr3.into_bits(), 0x0010_0018);
        assert!(cr3.pwt());
        assert!(cr3.pcd());
    }
}
