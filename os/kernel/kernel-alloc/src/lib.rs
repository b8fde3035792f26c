//! # Kernel Physical Memory and Kernel Address Space
//!
//! The allocator and the kernel mapping built on top of `kernel-vmem`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │           Kernel Address Space ([`kvm`])            │
//! │    • Fixed mapping table, installed in order        │
//! │    • Layout validation, cleanup on failure          │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ AddressSpace::map_region
//! ┌─────────────────▼───────────────────────────────────┐
//! │          kernel-vmem AddressSpace                   │
//! └────────┬───────────────────────────────┬────────────┘
//!          │ FrameAlloc                    │ PhysMapper
//! ┌────────▼──────────────────┐  ┌─────────▼────────────┐
//! │ Page Allocator            │  │ Direct-map mapper    │
//! │ ([`page_alloc`])          │  │ ([`phys_mapper`])    │
//! │ • LIFO frame stack        │  │ • `KERNBASE + pa`    │
//! │ • two-phase seeding       │  │                      │
//! └───────────────────────────┘  └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::kvm::{KernelLayout, build_kernel_address_space};
//! use kernel_alloc::page_alloc::PageAllocator;
//! use kernel_info::memory::PHYSTOP;
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! use kernel_vmem::testing::TestRam;
//!
//! let ram = TestRam::new();
//! let mut pages = PageAllocator::<_, 128>::new(&ram, PhysicalAddress::new(PHYSTOP));
//! pages.init_boot(PhysicalAddress::new(0x0020_0000), PhysicalAddress::new(0x0028_0000));
//!
//! let layout = KernelLayout::new(VirtualAddress::new(0xF011_0000));
//! let kvm = build_kernel_address_space(&ram, &mut pages, &layout).unwrap();
//! assert_eq!(
//!     kvm.query(VirtualAddress::new(0xF011_0042)),
//!     Some(PhysicalAddress::new(0x0011_0042))
//! );
//! kvm.destroy(&mut pages);
//! assert_eq!(pages.len(), 128);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod kvm;
pub mod page_alloc;
pub mod phys_mapper;
