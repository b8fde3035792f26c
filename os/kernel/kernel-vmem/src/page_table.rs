//! # Two-Level Page Tables

pub mod pd;
pub mod pt;

use crate::page_table::pd::PdIndex;
use crate::page_table::pt::PtIndex;
use kernel_memory_addresses::VirtualAddress;

/// Entries per table at either level.
pub const ENTRIES: usize = 1024;

/// Split a virtual address into its directory and table indices.
///
/// The remaining bits `[11:0]` are the byte offset inside the frame.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (PdIndex, PtIndex) {
    (PdIndex::from(va), PtIndex::from(va))
}
