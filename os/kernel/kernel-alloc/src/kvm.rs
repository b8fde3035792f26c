//! # Kernel Address Space
//!
//! Builds the page directory every address space shares above [`KERNBASE`]:
//!
//! | # | Virtual                  | Physical               | Access     |
//! |---|--------------------------|------------------------|------------|
//! | 0 | `KERNBASE .. KERNLINK`   | `0 .. EXTMEM`          | read/write |
//! | 1 | `KERNLINK .. data`       | `EXTMEM .. V2P(data)`  | read-only  |
//! | 2 | `data .. KERNBASE+PHYSTOP` | `V2P(data) .. PHYSTOP` | read/write |
//! | 3 | `DEVSPACE .. 4 GiB`      | `DEVSPACE .. 4 GiB`    | read/write |
//!
//! Row 0 covers low memory and legacy I/O, row 1 kernel text and rodata,
//! row 2 kernel data and all free memory, row 3 memory-mapped devices.
//!
//! Building never activates the result; call
//! [`AddressSpace::activate`](kernel_vmem::AddressSpace) for that.

use kernel_info::memory::{DEVSPACE, EXTMEM, KERNBASE, KERNLINK, PHYSTOP};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{
    AddressSpace, FrameAlloc, MapRegionError, OutOfMemory, Permissions, PhysMapper, Violation,
    fatal,
};
use log::info;
use thiserror::Error;

/// The addresses that shape the kernel mapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KernelLayout {
    pub kernbase: VirtualAddress,
    pub kernlink: VirtualAddress,
    pub extmem: PhysicalAddress,
    pub phys_top: PhysicalAddress,
    pub devspace: VirtualAddress,
    /// Start of the kernel's writable data, from the linker.
    pub data: VirtualAddress,
}

impl KernelLayout {
    /// The configured layout with the linker-provided `data` address.
    #[must_use]
    pub const fn new(data: VirtualAddress) -> Self {
        Self {
            kernbase: VirtualAddress::new(KERNBASE),
            kernlink: VirtualAddress::new(KERNLINK),
            extmem: PhysicalAddress::new(EXTMEM),
            phys_top: PhysicalAddress::new(PHYSTOP),
            devspace: VirtualAddress::new(DEVSPACE),
            data,
        }
    }

    /// Physical address of the kernel's data section.
    #[must_use]
    pub const fn data_phys(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.data.as_u32().wrapping_sub(self.kernbase.as_u32()))
    }
}

/// One contiguous kernel mapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MappingDescriptor {
    pub virt: VirtualAddress,
    pub phys_start: PhysicalAddress,
    /// `phys_end - phys_start`, taken modulo 4 GiB so a region ending at the
    /// top of the address space has `phys_end == 0`.
    pub size: u32,
    pub permissions: Permissions,
}

impl MappingDescriptor {
    const fn new(
        virt: VirtualAddress,
        phys_start: PhysicalAddress,
        phys_end: PhysicalAddress,
        permissions: Permissions,
    ) -> Self {
        Self {
            virt,
            phys_start,
            size: phys_end.as_u32().wrapping_sub(phys_start.as_u32()),
            permissions,
        }
    }
}

/// The kernel mappings in the order they are installed.
///
/// A `data` address outside `[kernlink, kernbase + phys_top]` produces sizes
/// that wrap, which [`build_kernel_address_space`] reports as a mapping error.
#[must_use]
pub const fn kernel_mappings(layout: &KernelLayout) -> [MappingDescriptor; 4] {
    [
        MappingDescriptor::new(
            layout.kernbase,
            PhysicalAddress::zero(),
            layout.extmem,
            Permissions::WRITABLE,
        ),
        MappingDescriptor::new(
            layout.kernlink,
            layout.extmem,
            layout.data_phys(),
            Permissions::empty(),
        ),
        MappingDescriptor::new(
            layout.data,
            layout.data_phys(),
            layout.phys_top,
            Permissions::WRITABLE,
        ),
        MappingDescriptor::new(
            layout.devspace,
            PhysicalAddress::new(layout.devspace.as_u32()),
            PhysicalAddress::zero(),
            Permissions::WRITABLE,
        ),
    ]
}

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum BuildError {
    #[error("no frame for the kernel page directory")]
    OutOfMemory,

    #[error("kernel mapping #{index} failed: {source}")]
    Map {
        index: usize,
        source: MapRegionError,
    },
}

/// Build the kernel page directory described by `layout`.
///
/// Page tables come from `alloc`. On failure everything allocated so far is
/// returned to `alloc`.
///
/// # Errors
/// - [`BuildError::OutOfMemory`] if there is no frame for the directory.
/// - [`BuildError::Map`] with the failing row of [`kernel_mappings`].
///
/// # Panics
/// Through [`fatal`] if the direct map would overlap device space, or if two
/// rows overlap.
pub fn build_kernel_address_space<'m, M: PhysMapper, A: FrameAlloc>(
    mapper: &'m M,
    alloc: &mut A,
    layout: &KernelLayout,
) -> Result<AddressSpace<'m, M>, BuildError> {
    let mut space = AddressSpace::new(mapper, alloc)
        .map_err(|OutOfMemory| BuildError::OutOfMemory)?;

    let direct_top = layout.kernbase.checked_add(layout.phys_top.as_u32());
    if direct_top.is_none_or(|top| top > layout.devspace) {
        fatal(Violation::LayoutCollision {
            kernbase: layout.kernbase,
            phys_top: layout.phys_top,
            devspace: layout.devspace,
        });
    }

    for (index, m) in kernel_mappings(layout).into_iter().enumerate() {
        if let Err(source) = space.map_region(alloc, m.virt, m.size, m.phys_start, m.permissions) {
            space.destroy(alloc);
            return Err(BuildError::Map { index, source });
        }
    }

    info!("kernel page directory ready at {}", space.root_page());
    Ok(space)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_alloc::PageAllocator;
    use kernel_memory_addresses::{PageSize, Size4K};
    use kernel_vmem::testing::TestRam;

    const DATA: u32 = 0xF010_8000;
    const POOL: u32 = 0x0040_0000;

    fn pool(ram: &TestRam, frames: u32) -> PageAllocator<'_, TestRam, 128> {
        let mut pages = PageAllocator::new(ram, PhysicalAddress::new(PHYSTOP));
        pages.init_boot(
            PhysicalAddress::new(POOL),
            PhysicalAddress::new(POOL + frames * 4096),
        );
        pages
    }

    #[test]
    fn mappings_follow_the_layout() {
        let rows = kernel_mappings(&KernelLayout::new(VirtualAddress::new(DATA)));
        assert_eq!(rows[0].size, EXTMEM);
        assert_eq!(rows[1].phys_start.as_u32(), EXTMEM);
        assert_eq!(rows[1].size, 0x8000);
        assert!(rows[1].permissions.is_empty());
        assert_eq!(rows[2].phys_start.as_u32(), 0x0010_8000);
        assert_eq!(rows[2].size, PHYSTOP - 0x0010_8000);
        assert_eq!(rows[3].phys_start.as_u32(), DEVSPACE);
        assert_eq!(rows[3].size, 0x0200_0000);
    }

    #[test]
    fn every_page_translates_to_its_counterpart() {
        let ram = TestRam::new();
        let mut pages = pool(&ram, 128);
        let layout = KernelLayout::new(VirtualAddress::new(DATA));
        let mut kvm = build_kernel_address_space(&ram, &mut pages, &layout).unwrap();

        for row in kernel_mappings(&layout) {
            let count = row.size >> Size4K::SHIFT;
            for i in 0..count {
                let va = VirtualAddress::new(row.virt.as_u32() + (i << Size4K::SHIFT));
                let pa = PhysicalAddress::new(row.phys_start.as_u32() + (i << Size4K::SHIFT));
                let pte = *kvm.resolve(va).unwrap();
                assert_eq!(pte.frame().map(|f| f.base()), Some(pa), "at {va}");
                assert_eq!(pte.permissions(), row.permissions, "at {va}");
            }
        }

        assert_eq!(
            kvm.query(VirtualAddress::new(DATA - 1)),
            Some(PhysicalAddress::new(0x0010_7FFF))
        );
        assert_eq!(
            kvm.query(VirtualAddress::new(0xFDFF_FFFF)),
            Some(PhysicalAddress::new(0x0DFF_FFFF))
        );
        assert_eq!(
            kvm.query(VirtualAddress::new(0xFFFF_FFFF)),
            Some(PhysicalAddress::new(0xFFFF_FFFF))
        );
        assert!(kvm.query(VirtualAddress::new(KERNBASE - 1)).is_none());
        assert!(kvm.query(VirtualAddress::new(0)).is_none());
    }

    #[test]
    fn low_and_device_windows_are_disjoint() {
        let ram = TestRam::new();
        let mut pages = pool(&ram, 128);
        let layout = KernelLayout::new(VirtualAddress::new(DATA));
        let kvm = build_kernel_address_space(&ram, &mut pages, &layout).unwrap();

        let low = kvm.directory_entry(VirtualAddress::new(KERNBASE)).table();
        let dev = kvm.directory_entry(VirtualAddress::new(DEVSPACE)).table();
        assert!(low.is_some() && dev.is_some());
        assert_ne!(low, dev);
        assert_eq!(kvm.query(VirtualAddress::new(KERNBASE)), Some(PhysicalAddress::zero()));
        assert_eq!(kvm.query(VirtualAddress::new(DEVSPACE)), Some(PhysicalAddress::new(DEVSPACE)));
    }

    #[test]
    fn destroy_returns_every_table_frame() {
        let ram = TestRam::new();
        let mut pages = pool(&ram, 128);
        let before = pages.len();
        let layout = KernelLayout::new(VirtualAddress::new(DATA));
        let kvm = build_kernel_address_space(&ram, &mut pages, &layout).unwrap();
        // 56 tables for the direct map, 8 for device space, 1 directory.
        assert_eq!(before - pages.len(), 65);
        kvm.destroy(&mut pages);
        assert_eq!(pages.len(), before);
    }

    #[test]
    fn exhausted_pool_fails_without_leaking() {
        let ram = TestRam::new();
        let mut pages = pool(&ram, 10);
        let layout = KernelLayout::new(VirtualAddress::new(DATA));
        let err = build_kernel_address_space(&ram, &mut pages, &layout).err();
        assert!(matches!(
            err,
            Some(BuildError::Map {
                index: 2,
                source: MapRegionError::OutOfMemory { .. }
            })
        ));
        assert_eq!(pages.len(), 10);
    }

    #[test]
    fn no_frame_for_the_directory() {
        let ram = TestRam::new();
        let mut pages = pool(&ram, 0);
        let layout = KernelLayout::new(VirtualAddress::new(DATA));
        assert_eq!(
            build_kernel_address_space(&ram, &mut pages, &layout).err(),
            Some(BuildError::OutOfMemory)
        );
    }

    #[test]
    #[should_panic(expected = "runs into device space")]
    fn direct_map_colliding_with_devices_is_fatal() {
        let ram = TestRam::new();
        let mut pages = pool(&ram, 4);
        let layout = KernelLayout {
            phys_top: PhysicalAddress::new(PHYSTOP + 0x1000),
            ..KernelLayout::new(VirtualAddress::new(DATA))
        };
        let _ = build_kernel_address_space(&ram, &mut pages, &layout);
    }

    #[test]
    fn data_below_kernlink_is_a_mapping_error() {
        let ram = TestRam::new();
        let mut pages = pool(&ram, 16);
        let layout = KernelLayout::new(VirtualAddress::new(KERNLINK - 0x1000));
        let err = build_kernel_address_space(&ram, &mut pages, &layout).err();
        assert!(matches!(
            err,
            Some(BuildError::Map {
                index: 1,
                source: MapRegionError::Overflow { .. }
            })
        ));
        assert_eq!(pages.len(), 16);
    }
}
