//! # Unrecoverable Invariant Violations
//!
//! Running out of frames is an ordinary error and travels through `Result`.
//! Everything in here is different: continuing after any of these would
//! corrupt the free pool or a live translation table, so the only way out is
//! [`fatal`], which never returns.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use thiserror::Error;

/// A broken memory-management invariant.
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum Violation {
    #[error("free of misaligned address {0}")]
    MisalignedFree(PhysicalAddress),

    #[error("free of {addr} below the end of the kernel image at {floor}")]
    FreeBelowFloor {
        addr: PhysicalAddress,
        floor: PhysicalAddress,
    },

    #[error("free of {addr} at or above the top of physical memory {top}")]
    FreeAbovePhysTop {
        addr: PhysicalAddress,
        top: PhysicalAddress,
    },

    #[error("double free of {0}")]
    DoubleFree(PhysicalAddress),

    /// The frame lies more than `capacity` frames above the floor.
    #[error("free of {addr} beyond the {capacity} frames the pool can track")]
    BeyondCapacity {
        addr: PhysicalAddress,
        capacity: usize,
    },

    #[error("free pool is empty after initialization")]
    PoolEmpty,

    #[error("free pool holds out-of-range frame {0}")]
    PoolCorrupted(PhysicalAddress),

    #[error("allocator initialization out of order: {0}")]
    PhaseOrder(&'static str),

    #[error("remap of {va}, already mapped to {existing}")]
    Remap {
        va: VirtualAddress,
        existing: PhysicalAddress,
    },

    #[error("{0} is outside the kernel's direct map")]
    NotDirectMapped(PhysicalAddress),

    #[error("direct map of {phys_top} bytes at {kernbase} runs into device space at {devspace}")]
    LayoutCollision {
        kernbase: VirtualAddress,
        phys_top: PhysicalAddress,
        devspace: VirtualAddress,
    },
}

/// Report `violation` and halt.
///
/// Logs at error level, then panics; the kernel's panic handler stops the CPU.
#[cold]
#[inline(never)]
#[track_caller]
pub fn fatal(violation: Violation) -> ! {
    log::error!("fatal: {violation}");
    panic!("{violation}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "misaligned address 0x00001234")]
    fn fatal_panics_with_message() {
        fatal(Violation::MisalignedFree(PhysicalAddress::new(0x1234)));
    }

    #[test]
    fn messages_name_the_addresses() {
        let v = Violation::Remap {
            va: VirtualAddress::new(0xF000_0000),
            existing: PhysicalAddress::new(0),
        };
        assert_eq!(
            v.to_string(),
            "remap of 0xF0000000, already mapped to 0x00000000"
        );
    }

    #[test]
    fn double_free_names_the_frame() {
        let v = Violation::DoubleFree(PhysicalAddress::new(0x0020_3000));
        assert_eq!(v.to_string(), "double free of 0x00203000");
    }
}
