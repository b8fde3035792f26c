//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 32-bit memory addresses and page bases used
//! by the paging and frame-allocation code.
//!
//! ## Overview
//!
//! | Concept | Generic | Description |
//! |----------|----------|-------------|
//! | [`MemoryAddress`] | – | A raw 32-bit address, either physical or virtual. |
//! | [`MemoryPage<S>`] | [`S: PageSize`](PageSize) | A page-aligned base address of a page of size `S`. |
//! | [`MemoryAddressOffset<S>`] | [`S: PageSize`](PageSize) | An offset within a page of size `S`. |
//!
//! These are wrapped to distinguish between virtual and physical spaces:
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Refer to virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Refer to physical memory or device windows. |
//!
//! ## Page Sizes
//!
//! Two-level x86 paging knows two granularities:
//!
//! - [`Size4K`]: 4 KiB frames, mapped by a page-table entry
//! - [`Size4M`]: the 4 MiB span covered by one page-directory entry
//!
//! ## Arithmetic
//!
//! Nothing in this crate wraps silently. Additions, subtractions and upward
//! alignment are `checked_*` and return `None` past the top of the 4 GiB space;
//! page bases and offsets are masked, so `join` can never overflow.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let top = VirtualAddress::new(0xFFFF_F000);
//! assert!(top.checked_add(0x1000).is_none());
//! assert!(top.page::<Size4K>().checked_next().is_none());
//! assert_eq!(top.checked_add(0xFFF).unwrap().as_u32(), 0xFFFF_FFFF);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod memory_address;
mod memory_address_offset;
mod memory_page;
mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use memory_address::MemoryAddress;
pub use memory_address_offset::MemoryAddressOffset;
pub use memory_page::MemoryPage;
pub use page_size::{PageSize, Size4K, Size4M};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;
