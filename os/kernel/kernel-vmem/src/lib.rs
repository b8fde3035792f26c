//! # Virtual Memory Support
//!
//! 32-bit x86 two-level paging for the kernel's address spaces.
//!
//! ## What you get
//! - An [`address space`](address_space) rooted at a page directory, with
//!   lookup, on-demand table creation, region mapping and teardown.
//! - The hardware entry layout ([`PageEntryBits`]) and typed tables
//!   ([`PageDirectory`], [`PageTable`]).
//! - Caller-facing leaf [`Permissions`].
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`]).
//! - [`fatal`] and its [`Violation`]s for invariant breaches.
//!
//! ## x86 Virtual Address → Physical Address Walk
//!
//! Each 32-bit virtual address is divided into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! ```text
//!  CR3 → PD  →  PT  →  Physical Frame
//!        │      │
//!        │      └───► PTE (Page Table Entry)     → maps 4 KiB frame
//!        └──────────► PDE (Page Directory Entry) → points to one PT (4 MiB of VA)
//! ```
//!
//! Each table holds 1024 (2¹⁰) entries of 4 bytes and fills exactly one frame.
//!
//! ### Permissions
//!
//! The CPU grants the intersection of the PDE and PTE rights. Directory entries
//! are therefore installed with present, writable and user set, and every
//! restriction is expressed on the leaf.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "testing"))]
extern crate alloc;

pub mod address_space;
mod fatal;
mod page_entry_bits;
mod page_table;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::address_space::{AddressSpace, MapRegionError, OutOfMemory};
pub use crate::fatal::{Violation, fatal};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{PageDirectory, PdEntry, PdIndex};
pub use crate::page_table::pt::{PageTable, PtEntry, PtIndex};
pub use crate::page_table::{ENTRIES, split_indices};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

bitflags::bitflags! {
    /// Access rights of a leaf mapping, in their hardware bit positions.
    ///
    /// Present is implied by installing a mapping and is not part of the set.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct Permissions: u32 {
        /// Writes are allowed.
        const WRITABLE = 1 << 1;
        /// User mode (CPL 3) may access the page.
        const USER = 1 << 2;
    }
}

/// Minimal frame allocator used to obtain **physical** 4 KiB frames
/// for page tables.
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame.
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// Give a frame obtained from [`alloc_4k`](Self::alloc_4k) back.
    fn free_4k(&mut self, frame: PhysicalPage<Size4K>);
}

/// Converts physical addresses to usable references in the current
/// virtual address space (e.g., via identity map or the kernel's direct map).
///
/// # Safety
/// - You must ensure `pa` is mapped as writable in the current page tables
///   for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}
