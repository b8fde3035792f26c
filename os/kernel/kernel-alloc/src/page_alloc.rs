//! # Physical Page Allocator
//!
//! Owns every free 4 KiB frame of the machine as a fixed-capacity stack.
//! Frames come back in last-in first-out order.
//!
//! ## Bring-up
//!
//! The pool is filled in two steps:
//!
//! 1. [`PageAllocator::init_boot`] hands over the frames the boot mapping can
//!    already reach. Its start address becomes the *floor*: the first byte
//!    past the kernel image. Nothing below it is ever accepted.
//! 2. [`PageAllocator::init_full`] adds the rest of physical memory once the
//!    full kernel address space is active, then runs [`PageAllocator::check`].
//!
//! ## Freed frames
//!
//! A freed frame is overwritten with [`JUNK`] before it joins the pool, so a
//! stale reference reads obvious garbage instead of old data.
//!
//! Every frame at most `N` frames above the floor has a slot in an in-pool
//! map. Freeing a frame whose slot is already set is a double free and fatal;
//! a frame past the last slot cannot be tracked and is fatal as well. Since
//! each slot holds at most one frame, the stack never outgrows `N`.

use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::{FrameAlloc, PhysMapper, Violation, fatal};
use log::{info, trace};

/// Fill byte for freed frames.
pub const JUNK: u8 = 0x01;

/// How far bring-up has progressed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// Constructed, nothing seeded yet.
    Uninitialized,
    /// Seeded with the boot-mapped frames.
    Boot,
    /// Seeded with all of physical memory.
    Full,
}

/// Free-frame pool for up to `N` frames, counted from the floor.
pub struct PageAllocator<'m, M: PhysMapper, const N: usize> {
    frames: [PhysicalPage<Size4K>; N],
    len: usize,
    /// Indexed by [`slot`](Self::slot); set while the frame sits in `frames`.
    in_pool: [bool; N],
    floor: PhysicalAddress,
    phys_top: PhysicalAddress,
    phase: Phase,
    mapper: &'m M,
}

impl<'m, M: PhysMapper, const N: usize> PageAllocator<'m, M, N> {
    /// An empty pool for memory below `phys_top`, scrubbing through `mapper`.
    #[must_use]
    pub const fn new(mapper: &'m M, phys_top: PhysicalAddress) -> Self {
        Self {
            frames: [PhysicalPage::from_addr(PhysicalAddress::zero()); N],
            len: 0,
            in_pool: [false; N],
            floor: PhysicalAddress::zero(),
            phys_top,
            phase: Phase::Uninitialized,
            mapper,
        }
    }

    /// Phase 1: set the floor to `start` and free every whole frame in
    /// `[start, end)`.
    ///
    /// # Panics
    /// Through [`fatal`] if called more than once.
    pub fn init_boot(&mut self, start: PhysicalAddress, end: PhysicalAddress) {
        if self.phase != Phase::Uninitialized {
            fatal(Violation::PhaseOrder("boot initialization ran twice"));
        }
        self.floor = start;
        self.phase = Phase::Boot;
        self.free_range(start, end);
        info!("boot pool: {} frames from [{start}, {end})", self.len);
    }

    /// Phase 2: free every whole frame in `[start, end)`, then [`check`](Self::check).
    ///
    /// # Panics
    /// Through [`fatal`] if phase 1 has not run, or phase 2 already has.
    pub fn init_full(&mut self, start: PhysicalAddress, end: PhysicalAddress) {
        match self.phase {
            Phase::Boot => {}
            Phase::Uninitialized => fatal(Violation::PhaseOrder(
                "full initialization before boot initialization",
            )),
            Phase::Full => fatal(Violation::PhaseOrder("full initialization ran twice")),
        }
        self.free_range(start, end);
        self.phase = Phase::Full;
        info!("full pool: {} frames after adding [{start}, {end})", self.len);
        self.check();
    }

    /// Take the most recently freed frame, or `None` when the pool is empty.
    pub fn allocate(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.len = self.len.checked_sub(1)?;
        let frame = self.frames[self.len];
        let slot = self.slot(frame.base());
        self.in_pool[slot] = false;
        trace!("allocate {frame}");
        Some(frame)
    }

    /// Return the frame at `pa` to the pool, scrubbing it to [`JUNK`].
    ///
    /// # Panics
    /// Through [`fatal`] if `pa` is misaligned, below the floor, at or above
    /// physical top, past the pool's capacity, already free, or if phase 1
    /// has not run.
    pub fn free(&mut self, pa: PhysicalAddress) {
        if self.phase == Phase::Uninitialized {
            fatal(Violation::PhaseOrder("free before boot initialization"));
        }
        if !pa.is_aligned::<Size4K>() {
            fatal(Violation::MisalignedFree(pa));
        }
        if pa < self.floor {
            fatal(Violation::FreeBelowFloor {
                addr: pa,
                floor: self.floor,
            });
        }
        if pa >= self.phys_top {
            fatal(Violation::FreeAbovePhysTop {
                addr: pa,
                top: self.phys_top,
            });
        }
        let slot = self.slot(pa);
        if slot >= N {
            fatal(Violation::BeyondCapacity {
                addr: pa,
                capacity: N,
            });
        }
        if self.in_pool[slot] {
            fatal(Violation::DoubleFree(pa));
        }

        // SAFETY: the frame lies in [floor, phys_top) and is being handed back
        // by its only owner.
        let bytes = unsafe { self.mapper.phys_to_mut::<[u8; 4096]>(pa) };
        bytes.fill(JUNK);

        self.frames[self.len] = pa.page();
        self.len += 1;
        self.in_pool[slot] = true;
        trace!("free {pa}");
    }

    /// Frames between the page holding the floor and `pa`, which must not lie
    /// below the floor.
    #[inline]
    const fn slot(&self, pa: PhysicalAddress) -> usize {
        let base = self.floor.page::<Size4K>().base().as_u32();
        ((pa.as_u32() - base) >> Size4K::SHIFT) as usize
    }

    /// Free every whole frame in `[start, end)`, rounding `start` up.
    pub fn free_range(&mut self, start: PhysicalAddress, end: PhysicalAddress) {
        let Some(mut pa) = start.checked_align_up::<Size4K>() else {
            return;
        };
        while let Some(next) = pa.checked_add(4096) {
            if next > end {
                break;
            }
            self.free(pa);
            pa = next;
        }
    }

    /// Walk the pool and verify every frame lies in `[floor, phys_top)`.
    ///
    /// # Panics
    /// Through [`fatal`] if the pool is empty or holds an out-of-range frame.
    pub fn check(&self) {
        if self.len == 0 {
            fatal(Violation::PoolEmpty);
        }
        for frame in &self.frames[..self.len] {
            let pa = frame.base();
            if pa < self.floor || pa >= self.phys_top {
                fatal(Violation::PoolCorrupted(pa));
            }
        }
        info!("free pool ok: {} frames ({} KiB)", self.len, self.len * 4);
    }

    /// Frames currently in the pool.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// First byte past the kernel image, as given to [`init_boot`](Self::init_boot).
    #[inline]
    #[must_use]
    pub const fn floor(&self) -> PhysicalAddress {
        self.floor
    }

    #[inline]
    #[must_use]
    pub const fn phys_top(&self) -> PhysicalAddress {
        self.phys_top
    }
}

impl<M: PhysMapper, const N: usize> FrameAlloc for PageAllocator<'_, M, N> {
    #[inline]
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.allocate()
    }

    #[inline]
    fn free_4k(&mut self, frame: PhysicalPage<Size4K>) {
        self.free(frame.base());
    }
}
