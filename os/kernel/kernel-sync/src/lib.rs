//! # Kernel synchronization primitives
//!
//! Bring-up runs on a single CPU with interrupts off. State that lives in a
//! `static` during that phase is handed out once, as a unique `&'static mut`,
//! through a [`BootCell`]. Every later user receives it by reference from the
//! code that claimed it.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod boot_cell;

pub use boot_cell::BootCell;
