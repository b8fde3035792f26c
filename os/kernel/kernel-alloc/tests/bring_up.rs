//! Two-phase bring-up on simulated memory.

use kernel_alloc::kvm::{KernelLayout, build_kernel_address_space};
use kernel_alloc::page_alloc::{JUNK, PageAllocator, Phase};
use kernel_info::memory::{BOOT_MAPPED_TOP, KERNBASE, PHYSTOP};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::testing::TestRam;

/// Pretend the kernel image ends here.
const IMAGE_END: u32 = 0xF012_3456;
const DATA: u32 = 0xF011_0000;

#[test]
fn boot_then_full() {
    let ram = TestRam::new();
    let mut pages = PageAllocator::<_, 1024>::new(&ram, PhysicalAddress::new(PHYSTOP));

    let floor = PhysicalAddress::new(IMAGE_END - KERNBASE);
    pages.init_boot(floor, PhysicalAddress::new(BOOT_MAPPED_TOP));
    assert_eq!(pages.phase(), Phase::Boot);
    // 0x0012_4000 .. 0x0040_0000
    assert_eq!(pages.len(), 732);

    let layout = KernelLayout::new(VirtualAddress::new(DATA));
    let kvm = build_kernel_address_space(&ram, &mut pages, &layout).unwrap();
    assert_eq!(pages.len(), 732 - 65);
    assert_eq!(kvm.query(VirtualAddress::new(IMAGE_END)), Some(floor));

    // Only a small slice of the rest of memory, to keep the simulation cheap.
    pages.init_full(
        PhysicalAddress::new(BOOT_MAPPED_TOP),
        PhysicalAddress::new(BOOT_MAPPED_TOP + 256 * 4096),
    );
    assert_eq!(pages.phase(), Phase::Full);
    assert_eq!(pages.len(), 732 - 65 + 256);

    // The last frame freed comes out first, still carrying the scrub pattern.
    let frame = pages.allocate().unwrap();
    assert_eq!(frame.base().as_u32(), BOOT_MAPPED_TOP + 255 * 4096);
    assert!(ram.frame_bytes(frame).iter().all(|&b| b == JUNK));
}

#[test]
fn page_tables_are_taken_from_the_boot_pool() {
    let ram = TestRam::new();
    let mut pages = PageAllocator::<_, 1024>::new(&ram, PhysicalAddress::new(PHYSTOP));
    pages.init_boot(
        PhysicalAddress::new(IMAGE_END - KERNBASE),
        PhysicalAddress::new(BOOT_MAPPED_TOP),
    );

    let layout = KernelLayout::new(VirtualAddress::new(DATA));
    let kvm = build_kernel_address_space(&ram, &mut pages, &layout).unwrap();
    let root = kvm.root_page().base().as_u32();
    assert!(root < BOOT_MAPPED_TOP);
    let table = kvm
        .directory_entry(VirtualAddress::new(KERNBASE))
        .table()
        .unwrap();
    assert!(table.base().as_u32() < BOOT_MAPPED_TOP);
}
