//! # Simulated Physical Memory
//!
//! Host-side stand-ins for RAM and a frame source, for tests of code that
//! walks or edits page tables. Enabled by the `testing` feature.
//!
//! Frames of [`TestRam`] materialize on first access and start out filled
//! with [`TestRam::UNTOUCHED`], so a test can tell "zeroed by the code under
//! test" apart from "never written".

use crate::{FrameAlloc, PhysMapper};
use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::ptr::NonNull;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// A 4 KiB-aligned raw frame.
#[repr(C, align(4096))]
struct Aligned4K([u8; 4096]);

/// Sparse physical memory covering the full 4 GiB space.
///
/// Physical addresses map 1:1 onto frames held on the heap.
pub struct TestRam {
    frames: RefCell<BTreeMap<u32, NonNull<Aligned4K>>>,
}

impl TestRam {
    /// Fill pattern of frames nobody has written yet.
    pub const UNTOUCHED: u8 = 0xCD;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: RefCell::new(BTreeMap::new()),
        }
    }

    fn frame_ptr(&self, frame: PhysicalPage<Size4K>) -> NonNull<Aligned4K> {
        *self
            .frames
            .borrow_mut()
            .entry(frame.number())
            .or_insert_with(|| {
                let boxed = Box::new(Aligned4K([Self::UNTOUCHED; 4096]));
                NonNull::from(Box::leak(boxed))
            })
    }

    /// Copy of the current contents of `frame`.
    #[must_use]
    pub fn frame_bytes(&self, frame: PhysicalPage<Size4K>) -> [u8; 4096] {
        // SAFETY: the pointer stays valid until `self` drops; no `&mut` is live
        // across this read in single-threaded tests.
        unsafe { self.frame_ptr(frame).as_ref().0 }
    }

    /// Number of frames that have been touched so far.
    #[must_use]
    pub fn touched_frames(&self) -> usize {
        self.frames.borrow().len()
    }
}

impl Default for TestRam {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRam {
    fn drop(&mut self) {
        for (_, frame) in core::mem::take(self.frames.get_mut()) {
            // SAFETY: every pointer came from `Box::leak` in `frame_ptr`.
            drop(unsafe { Box::from_raw(frame.as_ptr()) });
        }
    }
}

impl PhysMapper for TestRam {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let offset = pa.offset::<Size4K>().as_u32() as usize;
        debug_assert!(offset + size_of::<T>() <= 4096, "view crosses a frame boundary");
        let base = self.frame_ptr(pa.page::<Size4K>()).cast::<u8>();
        // SAFETY: in bounds of one heap frame; the caller guarantees `T` fits
        // the bytes and that no other reference aliases them.
        unsafe { base.add(offset).cast::<T>().as_mut() }
    }
}

/// A [`FrameAlloc`] over a fixed physical range that keeps track of what
/// it handed out.
///
/// Freed frames are reused last-in first-out. Freeing a frame that is not
/// outstanding panics.
pub struct TestFrames {
    next: u32,
    end: u32,
    free: Vec<PhysicalPage<Size4K>>,
    outstanding: BTreeSet<u32>,
}

impl TestFrames {
    /// Hand out the whole frames inside `[start, end)`.
    #[must_use]
    pub fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        Self {
            next: start.as_u32(),
            end: end.as_u32(),
            free: Vec::new(),
            outstanding: BTreeSet::new(),
        }
    }

    /// Frames currently allocated and not yet freed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether `frame` is currently allocated.
    #[must_use]
    pub fn is_outstanding(&self, frame: PhysicalPage<Size4K>) -> bool {
        self.outstanding.contains(&frame.number())
    }
}

impl FrameAlloc for TestFrames {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        let frame = match self.free.pop() {
            Some(frame) => frame,
            None => {
                if self.end.saturating_sub(self.next) < 4096 {
                    return None;
                }
                let frame = PhysicalAddress::new(self.next).page::<Size4K>();
                self.next += 4096;
                frame
            }
        };
        self.outstanding.insert(frame.number());
        Some(frame)
    }

    fn free_4k(&mut self, frame: PhysicalPage<Size4K>) {
        assert!(
            self.outstanding.remove(&frame.number()),
            "free of {frame} which is not allocated"
        );
        self.free.push(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_frames_carry_pattern() {
        let ram = TestRam::new();
        let frame = PhysicalAddress::new(0x1000).page::<Size4K>();
        assert!(ram.frame_bytes(frame).iter().all(|&b| b == TestRam::UNTOUCHED));
        assert_eq!(ram.touched_frames(), 1);
    }

    #[test]
    fn writes_are_visible_at_offsets() {
        let ram = TestRam::new();
        unsafe {
            *ram.phys_to_mut::<u32>(PhysicalAddress::new(0x2010)) = 0xDEAD_BEEF;
        }
        let bytes = ram.frame_bytes(PhysicalAddress::new(0x2000).page());
        assert_eq!(bytes[0x10..0x14], 0xDEAD_BEEFu32.to_ne_bytes());
    }

    #[test]
    fn frames_are_reused_lifo() {
        let mut frames =
            TestFrames::new(PhysicalAddress::new(0x1000), PhysicalAddress::new(0x4000));
        let a = frames.alloc_4k().unwrap();
        let b = frames.alloc_4k().unwrap();
        frames.free_4k(a);
        assert!(!frames.is_outstanding(a));
        assert!(frames.is_outstanding(b));
        frames.free_4k(b);
        assert_eq!(frames.alloc_4k(), Some(b));
        assert_eq!(frames.alloc_4k(), Some(a));
        assert!(frames.alloc_4k().is_some());
        assert!(frames.alloc_4k().is_none());
        assert_eq!(frames.outstanding(), 3);
    }
}
