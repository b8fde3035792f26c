use crate::Permissions;
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// Represents a single 32-bit x86 paging entry in its raw bitfield form.
///
/// Directory entries (PDE) and table entries (PTE) share one layout under
/// 32-bit non-PAE paging, so the same type backs both levels. The value is
/// reproduced bit-exact; hardware reads it directly.
///
/// ### Bit layout
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (PTE only) |
/// | 7         | `PS` / `PAT`      | Page size (PDE) or PAT (PTE); always 0 here |
/// | 8         | `G`               | Global (PTE only) |
/// | 9–11      | OS avail          | Reserved for OS use |
/// | 12–31     | `addr`            | Physical frame bits [31:12] |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let mut e = PageEntryBits::new();
/// e.set_present(true);
/// e.set_writable(true);
/// e.set_physical_address(PhysicalAddress::new(0x0012_3000));
/// assert!(e.present());
/// assert_eq!(e.into_bits(), 0x0012_3003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Set if the entry points to a page table (PDE) or maps a frame (PTE).
    pub present: bool,

    /// Writable (RW, bit 1).
    ///
    /// Set to allow writes; clear for read-only. Subject to CR0.WP behavior in
    /// supervisor mode.
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow user-mode access; clear restricts to supervisor only.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU on first access.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on first write through a PTE.
    pub dirty: bool,

    /// Page Size in a PDE (4 MiB page when set), PAT in a PTE.
    ///
    /// Nothing here maps 4 MiB pages, so this stays clear.
    pub large_page: bool,

    /// Global (G, bit 8).
    ///
    /// When set on a PTE, the TLB entry survives a CR3 reload.
    pub global_translation: bool,

    /// OS-available (bits 9..=11); ignored by hardware.
    #[bits(3)]
    pub os_available: u8,

    /// Physical address bits [31:12] (bits 12..=31).
    #[bits(20)]
    phys_addr_bits_31_12: u32,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        // store bits [31:12]
        self.set_phys_addr_bits_31_12(phys.as_u32() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_31_12() << 12)
    }

    /// The caller-controlled permission bits of this entry.
    #[inline]
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        Permissions::from_bits_truncate(self.into_bits())
    }

    /// Flags installed on every directory entry: present, writable and user.
    ///
    /// Restriction happens at the leaf level; the CPU applies the intersection
    /// of both levels.
    #[inline]
    #[must_use]
    pub const fn new_directory() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
    }
}
