//! # x86 Page Table (PT, leaf level)
//!
//! - [`PtIndex`]: index type for VA bits `[21:12]`.
//! - [`PtEntry`]: a PT entry (PTE) mapping exactly one 4 KiB frame.
//! - [`PageTable`]: a 4 KiB-aligned array of 1024 PTEs.
//!
//! ## Invariants & Notes
//!
//! - [`PageTable`] is 4 KiB-aligned and contains exactly 1024 entries.
//! - [`PtEntry::make`] produces `frame | permissions | P` and nothing else.
//! - After modifying active mappings, the caller must perform any required TLB maintenance.

use crate::page_table::ENTRIES;
use crate::{PageEntryBits, Permissions};
use kernel_memory_addresses::{PageSize, PhysicalPage, Size4K, Size4M, VirtualAddress};

/// Index into the Page Table (derived from VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PtIndex(u16);

/// A single Page Table entry (PTE).
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

/// The Page Table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES],
}

const _: () = assert!(size_of::<PageTable>() == 4096);

impl PtIndex {
    /// Build an index from a virtual address: the 4 KiB slot within its
    /// 4 MiB page (bits `[21:12]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self((va.offset::<Size4M>().as_u32() >> Size4K::SHIFT) as u16)
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

impl PtEntry {
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

    /// Map `frame` with `permissions`; the entry is always present.
    #[inline]
    #[must_use]
    pub const fn make(frame: PhysicalPage<Size4K>, permissions: Permissions) -> Self {
        let mut flags = PageEntryBits::from_bits(permissions.bits()).with_present(true);
        flags.set_physical_address(frame.base());
        Self(flags)
    }

    /// If present, the mapped frame.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalPage<Size4K>> {
        if !self.is_present() {
            return None;
        }
        Some(PhysicalPage::from_addr(self.0.physical_address()))
    }

    #[inline]
    #[must_use]
    pub const fn permissions(self) -> Permissions {
        self.0.permissions()
    }

    /// Expose the underlying bitfield for advanced inspection/masking.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// Return the raw 32-bit value (flags + address).
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

impl PageTable {
    /// Create a fully zeroed Page Table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); ENTRIES],
        }
    }

    /// Clear every entry in place.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PtEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: PtIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: PtIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Borrow the entry at `i` for in-place inspection or update.
    #[inline]
    pub const fn entry_mut(&mut self, i: PtIndex) -> &mut PtEntry {
        &mut self.entries[i.as_usize()]
    }
}
