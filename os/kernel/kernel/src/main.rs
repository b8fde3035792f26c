//! # Kernel Entry Point
//!
//! The boot stub enters [`kernel_main`] with the first 4 MiB of physical memory
//! mapped at both `0` and [`KERNBASE`](kernel_info::memory::KERNBASE). From
//! there bring-up runs in a single execution context:
//!
//! 1. install the QEMU debug-console logger,
//! 2. seed the page allocator with the boot-mapped frames past the image,
//! 3. build the kernel page directory and load it into CR3,
//! 4. hand the rest of physical memory to the allocator.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![allow(unsafe_code)]

#[cfg(target_os = "none")]
mod tracing;

#[cfg(target_os = "none")]
mod kernel {
    use crate::tracing::{trace_layout, trace_pool};
    use kernel_alloc::kvm::{KernelLayout, build_kernel_address_space};
    use kernel_alloc::page_alloc::PageAllocator;
    use kernel_alloc::phys_mapper::KernelPhysMapper;
    use kernel_info::memory::{BOOT_MAPPED_TOP, PAGE_SIZE, PHYSTOP, v2p};
    use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
    use kernel_qemu::{QemuLogger, qemu_trace};
    use kernel_sync::BootCell;
    use log::{LevelFilter, error, info};

    /// One pool slot per frame below [`PHYSTOP`].
    const POOL_FRAMES: usize = (PHYSTOP / PAGE_SIZE) as usize;

    static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Info);

    static MAPPER: KernelPhysMapper = KernelPhysMapper;

    static PAGES: BootCell<PageAllocator<'static, KernelPhysMapper, POOL_FRAMES>> =
        BootCell::new(PageAllocator::new(&MAPPER, PhysicalAddress::new(PHYSTOP)));

    unsafe extern "C" {
        /// Start of the kernel's writable data, page aligned (`kernel.ld`).
        static data: u8;
        /// First byte past the kernel image (`kernel.ld`).
        static end: u8;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn symbol_address(symbol: *const u8) -> VirtualAddress {
        VirtualAddress::new(symbol.addr() as u32)
    }

    /// Kernel entry, called by the boot stub on the boot stack.
    ///
    /// # ABI
    /// `no_mangle` and the C ABI let the stub jump here by name.
    #[unsafe(no_mangle)]
    pub extern "C" fn kernel_main() -> ! {
        if LOGGER.init().is_err() {
            qemu_trace!("logger was already installed\n");
        }

        let Some(pages) = PAGES.claim() else {
            panic!("page allocator claimed twice");
        };

        let image_end = symbol_address(&raw const end);
        let Some(image_end) = v2p(image_end) else {
            panic!("kernel image ends at {image_end}, below the direct map");
        };
        pages.init_boot(image_end, PhysicalAddress::new(BOOT_MAPPED_TOP));
        trace_pool("boot", pages);

        let layout = KernelLayout::new(symbol_address(&raw const data));
        trace_layout(&layout);

        let space = match build_kernel_address_space(&MAPPER, pages, &layout) {
            Ok(space) => space,
            Err(e) => panic!("unable to build the kernel address space: {e}"),
        };

        // SAFETY: the new directory maps the kernel image, its stack and the
        // direct map at the same virtual addresses as the boot mapping.
        unsafe { space.activate() };
        info!("switched to kernel page directory {}", space.root_page());

        pages.init_full(
            PhysicalAddress::new(BOOT_MAPPED_TOP),
            PhysicalAddress::new(PHYSTOP),
        );
        trace_pool("full", pages);

        info!("memory bring-up complete");
        loop {
            halt();
        }
    }

    fn halt() {
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }

    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        error!("kernel panic: {info}");
        qemu_trace!("halted\n");

        unsafe {
            core::arch::asm!("cli", options(nomem, nostack));
        }
        loop {
            halt();
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
