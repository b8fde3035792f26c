//! # Address Space (x86, page-directory rooted)
//!
//! Strongly-typed helpers to build and manipulate a **single** virtual address
//! space: one [`PageDirectory`] plus the [`PageTable`]s it references.
//!
//! ## Highlights
//!
//! - [`AddressSpace::resolve`] finds the leaf entry for an address, if its
//!   page table exists.
//! - [`AddressSpace::resolve_or_create`] additionally allocates and links a
//!   missing page table.
//! - [`AddressSpace::map_region`] maps a byte range frame by frame.
//! - [`AddressSpace::query`] translates a VA to a PA.
//! - [`AddressSpace::destroy`] hands the table frames back to the allocator.
//! - [`AddressSpace::activate`] loads CR3 with this space's directory.
//!
//! ## Design
//!
//! - Directory entries are always present, writable and user; leaf entries
//!   carry the caller's [`Permissions`]. The CPU enforces the intersection.
//! - Table frames come from a [`FrameAlloc`] and are zero-filled before they
//!   are linked in.
//! - `unsafe` is confined to viewing a table frame through the [`PhysMapper`].
//!
//! ## Safety
//!
//! - Mutating active mappings requires appropriate **TLB maintenance** (e.g.,
//!   `invlpg` per page or CR3 reload).
//! - The provided `PhysMapper` must yield **writable** references to table frames.

use crate::fatal::{Violation, fatal};
use crate::page_table::pd::{PageDirectory, PdEntry};
use crate::page_table::pt::{PageTable, PtEntry};
use crate::page_table::split_indices;
use crate::{FrameAlloc, Permissions, PhysMapper};
use kernel_memory_addresses::{
    PageSize, PhysicalAddress, PhysicalPage, Size4K, VirtualAddress, VirtualPage,
};
use kernel_registers::cr3::Cr3;
use log::{debug, trace};
use thiserror::Error;

/// The allocator had no frame for a new table.
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
#[error("out of physical frames")]
pub struct OutOfMemory;

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum MapRegionError {
    /// No frame for the page table covering `va`. Pages before it stay mapped.
    #[error("out of physical frames for the page table of {va}")]
    OutOfMemory { va: VirtualAddress },

    /// The virtual or physical range runs past the top of the 4 GiB space.
    #[error("region of {size:#x} bytes at {va} -> {pa} wraps around 4 GiB")]
    Overflow {
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u32,
    },
}

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysicalPage<Size4K>, // page directory frame
    mapper: &'m M,
}

/// The page directory frame of an [`AddressSpace`].
pub type RootPage = PhysicalPage<Size4K>;

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Allocate and clear a new page directory.
    ///
    /// # Errors
    /// [`OutOfMemory`] if the allocator is empty.
    pub fn new<A: FrameAlloc>(mapper: &'m M, alloc: &mut A) -> Result<Self, OutOfMemory> {
        let root = alloc.alloc_4k().ok_or(OutOfMemory)?;
        let mut space = Self { root, mapper };
        space.directory_mut().zero();
        debug!("new page directory at {root}");
        Ok(space)
    }

    /// Physical page of the page directory.
    #[inline]
    #[must_use]
    pub const fn root_page(&self) -> RootPage {
        self.root
    }

    /// The CR3 value that activates this address space.
    #[inline]
    #[must_use]
    pub const fn cr3(&self) -> Cr3 {
        Cr3::from_page_directory(self.root, false, false)
    }

    /// Load CR3 with this address space's page directory.
    ///
    /// # Safety
    /// Paging must be set up such that the currently executing code, its stack
    /// and the [`PhysMapper`] window stay mapped in the target space.
    #[cfg(target_arch = "x86")]
    #[inline]
    pub unsafe fn activate(&self) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { self.cr3().store_unsafe() };
    }

    #[inline]
    fn directory(&self) -> &PageDirectory {
        // SAFETY: `root` was allocated and zeroed by `new` and is owned by `self`.
        unsafe { self.mapper.phys_to_mut::<PageDirectory>(self.root.base()) }
    }

    #[inline]
    fn directory_mut(&mut self) -> &mut PageDirectory {
        // SAFETY: see `directory`; `&mut self` makes the borrow unique.
        unsafe { self.mapper.phys_to_mut::<PageDirectory>(self.root.base()) }
    }

    #[inline]
    fn table(&self, frame: PhysicalPage<Size4K>) -> &PageTable {
        // SAFETY: only frames taken from a present directory entry reach here.
        unsafe { self.mapper.phys_to_mut::<PageTable>(frame.base()) }
    }

    #[inline]
    fn table_mut(&mut self, frame: PhysicalPage<Size4K>) -> &mut PageTable {
        // SAFETY: see `table`, or a frame just handed out by the allocator.
        unsafe { self.mapper.phys_to_mut::<PageTable>(frame.base()) }
    }

    /// The directory entry covering `va`.
    #[inline]
    #[must_use]
    pub fn directory_entry(&self, va: VirtualAddress) -> PdEntry {
        let (di, _) = split_indices(va);
        self.directory().get(di)
    }

    /// Find the leaf entry for `va` without creating anything.
    ///
    /// `None` means no page table covers `va` yet, i.e. the address is unmapped.
    pub fn resolve(&mut self, va: VirtualAddress) -> Option<&mut PtEntry> {
        let (di, ti) = split_indices(va);
        let frame = self.directory().get(di).table()?;
        Some(self.table_mut(frame).entry_mut(ti))
    }

    /// Find the leaf entry for `va`, allocating and linking a zeroed page
    /// table if the directory entry is absent.
    ///
    /// # Errors
    /// [`OutOfMemory`] if a new table is needed and `alloc` is empty. Nothing
    /// is modified in that case.
    pub fn resolve_or_create<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Result<&mut PtEntry, OutOfMemory> {
        let (di, ti) = split_indices(va);
        let frame = match self.directory().get(di).table() {
            Some(frame) => frame,
            None => {
                let frame = alloc.alloc_4k().ok_or(OutOfMemory)?;
                self.table_mut(frame).zero();
                self.directory_mut().set(di, PdEntry::make_table(frame));
                trace!("page table {frame} covers directory slot {}", di.as_usize());
                frame
            }
        };
        Ok(self.table_mut(frame).entry_mut(ti))
    }

    /// Map `[va, va + size)` to the frames starting at `pa`.
    ///
    /// Both ends may be unaligned: every page touched by the range is mapped,
    /// and `pa` advances in step with it from the frame containing `pa`.
    /// A `size` of zero maps nothing.
    ///
    /// # Errors
    /// - [`MapRegionError::Overflow`] if either range wraps past 4 GiB; checked
    ///   before anything is mapped.
    /// - [`MapRegionError::OutOfMemory`] if a page table cannot be allocated.
    ///   Pages mapped before the failure are **not** rolled back.
    ///
    /// # Panics
    /// Through [`fatal`] if any page in the range is already mapped.
    pub fn map_region<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        size: u32,
        pa: PhysicalAddress,
        permissions: Permissions,
    ) -> Result<(), MapRegionError> {
        if size == 0 {
            return Ok(());
        }

        let overflow = MapRegionError::Overflow { va, pa, size };
        let last_byte = va.checked_add(size - 1).ok_or(overflow)?;
        let first = VirtualPage::<Size4K>::containing_address(va);
        let last = VirtualPage::<Size4K>::containing_address(last_byte);
        let pages = last.number() - first.number() + 1;

        let first_frame = pa.page::<Size4K>();
        first_frame
            .base()
            .checked_add((pages - 1) << Size4K::SHIFT)
            .ok_or(overflow)?;

        debug!("map {va} +{size:#x} -> {pa} ({pages} pages, {permissions:?})");

        let mut page = Some(first);
        let mut frame = Some(first_frame);
        for _ in 0..pages {
            let (Some(p), Some(f)) = (page, frame) else {
                break;
            };
            let entry = self
                .resolve_or_create(alloc, p.base())
                .map_err(|OutOfMemory| MapRegionError::OutOfMemory { va: p.base() })?;
            if let Some(existing) = entry.frame() {
                fatal(Violation::Remap {
                    va: p.base(),
                    existing: existing.base(),
                });
            }
            *entry = PtEntry::make(f, permissions);
            trace!("{p} -> {f}");

            page = p.checked_next();
            frame = f.checked_next();
        }
        Ok(())
    }

    /// Translate `va` through the tables, keeping the in-frame offset.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (di, ti) = split_indices(va);
        let table = self.directory().get(di).table()?;
        let frame = self.table(table).get(ti).frame()?;
        Some(frame.join(va.offset::<Size4K>()))
    }

    /// Return every page table and then the directory itself to `alloc`.
    ///
    /// Frames mapped by leaf entries are not touched; they belong to whoever
    /// mapped them.
    pub fn destroy<A: FrameAlloc>(self, alloc: &mut A) {
        let mut tables = 0usize;
        for table in self.directory().tables() {
            alloc.free_4k(table);
            tables += 1;
        }
        alloc.free_4k(self.root);
        debug!("released page directory {} and {tables} page tables", self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestFrames, TestRam};

    const POOL_START: u32 = 0x0040_0000;

    fn pool(frames: u32) -> TestFrames {
        TestFrames::new(
            PhysicalAddress::new(POOL_START),
            PhysicalAddress::new(POOL_START + frames * 4096),
        )
    }

    #[test]
    fn new_directory_is_zeroed() {
        let ram = TestRam::new();
        let mut frames = pool(4);
        let aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        assert_eq!(aspace.root_page().base().as_u32(), POOL_START);
        assert!(ram.frame_bytes(aspace.root_page()).iter().all(|&b| b == 0));
    }

    #[test]
    fn new_without_frames_fails() {
        let ram = TestRam::new();
        let mut frames = pool(0);
        assert!(matches!(AddressSpace::new(&ram, &mut frames), Err(OutOfMemory)));
    }

    #[test]
    fn resolve_then_create_then_resolve() {
        let ram = TestRam::new();
        let mut frames = pool(4);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        let va = VirtualAddress::new(0xF012_3456);

        assert!(aspace.resolve(va).is_none());
        let entry = aspace.resolve_or_create(&mut frames, va).unwrap();
        assert!(!entry.is_present());
        assert!(aspace.resolve(va).is_some());
        assert_eq!(frames.outstanding(), 2);

        // Same directory slot: no second table.
        aspace
            .resolve_or_create(&mut frames, VirtualAddress::new(0xF000_0000))
            .unwrap();
        assert_eq!(frames.outstanding(), 2);
    }

    #[test]
    fn new_table_is_zeroed_and_linked_permissively() {
        let ram = TestRam::new();
        let mut frames = pool(4);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        let va = VirtualAddress::new(0x0804_8000);
        aspace.resolve_or_create(&mut frames, va).unwrap();

        let pde = aspace.directory_entry(va);
        let table = pde.table().unwrap();
        assert_eq!(pde.raw(), table.base().as_u32() | 0b111);
        assert!(ram.frame_bytes(table).iter().all(|&b| b == 0));
    }

    #[test]
    fn create_without_frames_reports_oom() {
        let ram = TestRam::new();
        let mut frames = pool(1);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        let va = VirtualAddress::new(0xF000_0000);
        assert_eq!(aspace.resolve_or_create(&mut frames, va).err(), Some(OutOfMemory));
        assert!(!aspace.directory_entry(va).is_present());
    }

    #[test]
    fn unaligned_region_maps_every_touched_page() {
        let ram = TestRam::new();
        let mut frames = pool(4);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();

        let va = VirtualAddress::new(0xF040_0000 + 100);
        let pa = PhysicalAddress::new(0x0030_0000);
        aspace
            .map_region(&mut frames, va, 2 * 4096, pa, Permissions::WRITABLE)
            .unwrap();

        for i in 0..3u32 {
            let page = VirtualAddress::new(0xF040_0000 + i * 4096);
            let pte = *aspace.resolve(page).unwrap();
            assert_eq!(pte.raw(), (0x0030_0000 + i * 4096) | 0b011);
        }
        assert!(!aspace.resolve(VirtualAddress::new(0xF040_3000)).unwrap().is_present());
        assert!(aspace.resolve(VirtualAddress::new(0xF03F_F000)).is_none());
        assert_eq!(
            aspace.query(VirtualAddress::new(0xF040_1234)),
            Some(PhysicalAddress::new(0x0030_1234))
        );
    }

    #[test]
    fn region_across_directory_boundary_creates_two_tables() {
        let ram = TestRam::new();
        let mut frames = pool(4);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        aspace
            .map_region(
                &mut frames,
                VirtualAddress::new(0xF03F_F000),
                0x2000,
                PhysicalAddress::new(0x0010_0000),
                Permissions::empty(),
            )
            .unwrap();
        assert_eq!(frames.outstanding(), 3);
        assert_eq!(
            aspace.query(VirtualAddress::new(0xF040_0000)),
            Some(PhysicalAddress::new(0x0010_1000))
        );
        assert_eq!(
            aspace.resolve(VirtualAddress::new(0xF03F_F000)).map(|e| e.permissions()),
            Some(Permissions::empty())
        );
    }

    #[test]
    fn empty_region_maps_nothing() {
        let ram = TestRam::new();
        let mut frames = pool(2);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        aspace
            .map_region(
                &mut frames,
                VirtualAddress::new(0xF000_0000),
                0,
                PhysicalAddress::zero(),
                Permissions::WRITABLE,
            )
            .unwrap();
        assert_eq!(frames.outstanding(), 1);
        assert!(aspace.query(VirtualAddress::new(0xF000_0000)).is_none());
    }

    #[test]
    fn region_up_to_the_last_byte() {
        let ram = TestRam::new();
        let mut frames = pool(16);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        let devspace = VirtualAddress::new(0xFE00_0000);
        aspace
            .map_region(
                &mut frames,
                devspace,
                0x0200_0000,
                PhysicalAddress::new(0xFE00_0000),
                Permissions::WRITABLE,
            )
            .unwrap();
        assert_eq!(
            aspace.query(VirtualAddress::new(0xFFFF_FFFF)),
            Some(PhysicalAddress::new(0xFFFF_FFFF))
        );
    }

    #[test]
    fn wrapping_region_is_rejected_up_front() {
        let ram = TestRam::new();
        let mut frames = pool(4);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();

        let va = VirtualAddress::new(0xFFFF_F000);
        let err = aspace
            .map_region(&mut frames, va, 0x2000, PhysicalAddress::zero(), Permissions::WRITABLE)
            .unwrap_err();
        assert!(matches!(err, MapRegionError::Overflow { .. }));

        let err = aspace
            .map_region(
                &mut frames,
                VirtualAddress::new(0x1000),
                0x2000,
                PhysicalAddress::new(0xFFFF_F000),
                Permissions::WRITABLE,
            )
            .unwrap_err();
        assert!(matches!(err, MapRegionError::Overflow { .. }));
        assert_eq!(frames.outstanding(), 1);
    }

    #[test]
    fn region_oom_keeps_earlier_pages() {
        let ram = TestRam::new();
        let mut frames = pool(2);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        let err = aspace
            .map_region(
                &mut frames,
                VirtualAddress::new(0xF03F_F000),
                0x2000,
                PhysicalAddress::new(0x0010_0000),
                Permissions::WRITABLE,
            )
            .unwrap_err();
        assert_eq!(
            err,
            MapRegionError::OutOfMemory {
                va: VirtualAddress::new(0xF040_0000)
            }
        );
        assert!(aspace.query(VirtualAddress::new(0xF03F_F000)).is_some());
    }

    #[test]
    #[should_panic(expected = "remap of 0xF0001000")]
    fn overlapping_regions_are_fatal() {
        let ram = TestRam::new();
        let mut frames = pool(4);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        let perms = Permissions::WRITABLE;
        aspace
            .map_region(
                &mut frames,
                VirtualAddress::new(0xF000_0000),
                0x2000,
                PhysicalAddress::zero(),
                perms,
            )
            .unwrap();
        let _ = aspace.map_region(
            &mut frames,
            VirtualAddress::new(0xF000_1000),
            0x1000,
            PhysicalAddress::new(0x5000),
            perms,
        );
    }

    #[test]
    fn destroy_returns_scaffolding_only() {
        let ram = TestRam::new();
        let mut frames = pool(8);
        let mut aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        for va in [0x0000_0000, 0x0040_0000, 0xF000_0000] {
            aspace
                .map_region(
                    &mut frames,
                    VirtualAddress::new(va),
                    0x1000,
                    PhysicalAddress::new(0x0090_0000),
                    Permissions::WRITABLE,
                )
                .unwrap();
        }
        assert_eq!(frames.outstanding(), 4);
        let root = aspace.root_page();
        assert!(frames.is_outstanding(root));
        aspace.destroy(&mut frames);
        assert_eq!(frames.outstanding(), 0);
        assert!(!frames.is_outstanding(root));
    }

    #[test]
    fn cr3_points_at_directory() {
        let ram = TestRam::new();
        let mut frames = pool(1);
        let aspace = AddressSpace::new(&ram, &mut frames).unwrap();
        assert_eq!(aspace.cr3().into_bits(), POOL_START);
        assert_eq!(aspace.cr3().page_directory(), aspace.root_page().base());
    }
}
