//! # Kernel Configuration
//!
//! Memory layout constants shared by the allocator, the page-table code and
//! the kernel's `build.rs`. It is the single source of truth for where the
//! kernel lives and how physical memory is reached from kernel space.
//!
//! ## Virtual Memory Architecture
//!
//! The kernel runs in the top 256 MiB of a 32-bit address space and sees all
//! usable physical memory through a fixed offset:
//!
//! ```text
//! Virtual Address Space Layout (32-bit):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │         User Space              │
//! KERNBASE    ├─────────────────────────────────┤ 0xF000_0000
//!             │  Low memory / legacy I/O        │ -> 0x0000_0000 .. EXTMEM
//! KERNLINK    ├─────────────────────────────────┤ 0xF010_0000
//!             │  Kernel text + rodata (RO)      │ -> EXTMEM .. V2P(data)
//! data        ├─────────────────────────────────┤
//!             │  Kernel data + free memory      │ -> V2P(data) .. PHYSTOP
//! DEVSPACE    ├─────────────────────────────────┤ 0xFE00_0000 (= KERNBASE + PHYSTOP)
//!             │  Device window (identity)       │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! ### Build Script Integration
//! ```rust
//! use kernel_info::memory::{EXTMEM, KERNLINK};
//!
//! println!("cargo:rustc-link-arg=--defsym=KERNLINK={KERNLINK:#x}");
//! println!("cargo:rustc-link-arg=--defsym=EXTMEM={EXTMEM:#x}");
//! ```
//!
//! Every constant is checked at compile time; a layout in which the direct map
//! would run into the device window does not build.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
