//! Memory management: physical frames, page tables, and the virtual
//! memory layer built on top of them (spec.md §4.3-§4.6).
//!
//! Boot order mirrors `examples/original_source/src/vm.c`'s `init_vmm`/
//! `kinit`/`paging_init` sequence: the page-table slab allocator's boot
//! pool is seeded first (§4.5) since the earliest calls into `vmm::map`
//! need page tables before the buddy allocator exists, then the buddy
//! allocator is seeded over the rest of physical RAM (§4.4), then
//! `paging_init` replaces the boot code's coarse 1 MiB identity sections
//! with a proper second-level 1:1 map of all of physical RAM (spec.md
//! §4.3's "identity mapping is torn down").

pub mod frame_allocator;
pub mod page_table;
pub mod vmm;

pub use frame_allocator::{FrameAllocator, FRAME_ALLOCATOR};
pub use page_table::{
    kpt_alloc, kpt_free, kpt_freerange, Ap, KernelPageDirectory, PageDirectory, PageTable, Table,
};
pub use vmm::{
    allocuvm, clearpteu, copyout, copyuvm, deallocuvm, freevm, inituvm, loaduvm, map, switchuvm,
    uva2ka, SegmentReader,
};

use crate::error::KernelResult;
use crate::layout::p2v;

/// Bring up the allocators this crate owns. `boot_pt_range` is the
/// physical range the linker/boot assembly reserved for page tables
/// before any of this runs; `phys_range` is the rest of physical RAM,
/// handed to the buddy allocator.
///
/// Must run exactly once, after the boot code's provisional identity map
/// covers both ranges but before any caller reaches for `kpt_alloc` or
/// `FRAME_ALLOCATOR`.
pub fn init(boot_pt_range: (usize, usize), phys_range: (usize, usize)) {
    let (pt_lo, pt_hi) = boot_pt_range;
    page_table::kpt_freerange(p2v(pt_lo), p2v(pt_hi));

    let (phys_lo, phys_hi) = phys_range;
    FRAME_ALLOCATOR.init(phys_lo, phys_hi);
}

/// Replace the boot code's coarse 1 MiB sections over `[phy_low, phy_hi)`
/// with a proper second-level 1:1 map of that physical range into
/// `kpgdir`, then flush the TLB so every core observes only the new
/// mapping (spec.md §4.3, supplemented by `original_source/src/vm.c`
/// `paging_init`). `kpgdir` is the kernel's 4096-entry global directory,
/// not a process's 256-entry user directory — `vmm::map`'s directory
/// index is generic over the root's entry count precisely so this call
/// and a process's `map` calls share one implementation.
pub fn paging_init(
    kpgdir: &mut KernelPageDirectory,
    phy_low: usize,
    phy_hi: usize,
) -> KernelResult<()> {
    // `Ap::KernelUser` here, not `KernelOnly`, matches
    // `original_source/src/vm.c`'s `paging_init` verbatim (`AP_KU`): the
    // kernel direct map's access bits are moot for isolation anyway,
    // since user code reaches this directory only through TTBR1, never
    // through the TTBR0 table its own page-table walks use.
    vmm::map(kpgdir, p2v(phy_low), phy_hi - phy_low, phy_low, Ap::KernelUser)?;
    crate::arch::arm::mmu::flush_tlb();
    Ok(())
}
