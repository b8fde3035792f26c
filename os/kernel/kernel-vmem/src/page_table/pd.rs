//! # x86 Page Directory (PD, top level)
//!
//! - [`PdIndex`]: index type for virtual-address bits `[31:22]`.
//! - [`PdEntry`]: a directory entry pointing to one [`PageTable`](super::pt::PageTable).
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 entries, each covering 4 MiB.
//!
//! ## Invariants & Notes
//!
//! - Entries are never 4 MiB leaves; `PS` is always 0.
//! - [`PdEntry::make_table`] always installs present, writable and user.
//! - TLB maintenance is the caller's responsibility after mutating active mappings.

use crate::PageEntryBits;
use crate::page_table::ENTRIES;
use kernel_memory_addresses::{PhysicalPage, Size4K, Size4M, VirtualAddress};

/// Index into the Page Directory (derived from VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdIndex(u16);

/// A single Page Directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdEntry(PageEntryBits);

/// The Page Directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES],
}

const _: () = assert!(size_of::<PageDirectory>() == 4096);

impl PdIndex {
    /// Build an index from a virtual address: the number of its 4 MiB page
    /// (bits `[31:22]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(va.page::<Size4M>().number() as u16)
    }

    /// Construct from a raw `u16`.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl PdEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// Point at the page table in `table` with the directory flags.
    #[inline]
    #[must_use]
    pub const fn make_table(table: PhysicalPage<Size4K>) -> Self {
        let mut flags = PageEntryBits::new_directory();
        flags.set_physical_address(table.base());
        Self(flags)
    }

    /// If present, the frame holding the referenced page table.
    #[inline]
    #[must_use]
    pub const fn table(self) -> Option<PhysicalPage<Size4K>> {
        if !self.is_present() {
            return None;
        }
        Some(PhysicalPage::from_addr(self.0.physical_address()))
    }

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }

    /// Construct from a raw 32-bit value. No validation is performed.
    #[inline]
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        Self(PageEntryBits::from_bits(v))
    }
}

impl PageDirectory {
    /// Create a fully zeroed directory (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdEntry::zero(); ENTRIES],
        }
    }

    /// Clear every entry in place.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PdEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: PdIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: PdIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Frames of every page table referenced by a present entry.
    pub fn tables(&self) -> impl Iterator<Item = PhysicalPage<Size4K>> + '_ {
        self.entries.iter().filter_map(|e| e.table())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn directory_entry_is_permissive() {
        let frame = PhysicalAddress::new(0x0003_F000).page::<Size4K>();
        let e = PdEntry::make_table(frame);
        assert_eq!(e.raw(), 0x0003_F007);
        assert_eq!(e.table(), Some(frame));
        assert!(!e.flags().large_page());
    }

    #[test]
    fn absent_entry_has_no_table() {
        assert_eq!(PdEntry::zero().table(), None);
        assert_eq!(PdEntry::from_raw(0x0003_F006).table(), None);
    }

    #[test]
    fn tables_skips_absent_entries() {
        let mut pd = PageDirectory::zeroed();
        let a = PhysicalAddress::new(0x1000).page::<Size4K>();
        let b = PhysicalAddress::new(0x5000).page::<Size4K>();
        pd.set(PdIndex::new(3), PdEntry::make_table(a));
        pd.set(PdIndex::new(1023), PdEntry::make_table(b));
        assert!(pd.tables().eq([a, b]));
        pd.zero();
        assert_eq!(pd.tables().count(), 0);
    }
}
