//! # Kernel Tracing helpers

use kernel_alloc::kvm::{KernelLayout, kernel_mappings};
use kernel_alloc::page_alloc::PageAllocator;
use kernel_vmem::PhysMapper;
use log::info;

pub fn trace_layout(layout: &KernelLayout) {
    info!(
        "Kernel layout: kernbase = {}, kernlink = {}, data = {} ({}), devspace = {}",
        layout.kernbase,
        layout.kernlink,
        layout.data,
        layout.data_phys(),
        layout.devspace,
    );
    for (index, m) in kernel_mappings(layout).iter().enumerate() {
        info!(
            "  #{index}: {} -> {}, {:#010x} bytes, {:?}",
            m.virt, m.phys_start, m.size, m.permissions
        );
    }
}

pub fn trace_pool<M: PhysMapper, const N: usize>(phase: &str, pages: &PageAllocator<'_, M, N>) {
    info!(
        "Page pool after {phase} init: {} of {} slots, floor = {}, top = {}",
        pages.len(),
        pages.capacity(),
        pages.floor(),
        pages.phys_top(),
    );
}
