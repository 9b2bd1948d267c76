//! Page-table entry encoding and the page-table slab allocator
//! (spec.md §4.5), grounded in `examples/original_source/src/vm.c` and
//! `mmu.h`.
//!
//! ARM's two-level tables are 1 KiB (256 entries), a quarter of a 4 KiB
//! frame — too small for the buddy allocator's page granularity to hand
//! out directly. `kpt_alloc`/`kpt_free` slab 4 KiB frames into four 1 KiB
//! blocks: an initial boot pool seeded by `kpt_freerange` over memory the
//! boot code set aside before the frame allocator exists, and — once
//! `mm::init` has handed frames above `layout::INIT_KERNMAP` to the
//! buddy allocator — frames pulled from there on demand. The two sources
//! share one intrusive free list; only blocks carved from a
//! buddy-sourced frame are ever coalesced back into that frame and
//! returned to the buddy allocator, which happens exactly when all four
//! quarters of the same frame are simultaneously free.

use core::ptr;

use bitflags::bitflags;
use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::layout::{align_down, p2v, v2p, INIT_KERNMAP, NUM_PTE, PAGE_SIZE, PT_SIZE};
use crate::mm::frame_allocator::FRAME_ALLOCATOR;

bitflags! {
    /// Type and cache/buffer bits shared by first- and second-level ARM
    /// page-table entries (spec.md §3's abstract encoding; bit positions
    /// taken verbatim from `examples/original_source/src/mmu.h`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        /// First-level entry pointing at a coarse (1 KiB) second-level
        /// table.
        const COARSE = 0x01;
        /// First-level section entry, or second-level small-page entry
        /// with subpages disabled — same bit pattern, different table
        /// level.
        const SECTION_OR_PAGE = 0x02;
        /// Entry is bufferable.
        const BUFFERED = 1 << 2;
        /// Entry is cacheable.
        const CACHEABLE = 1 << 3;
    }
}

impl PteFlags {
    /// Mask covering bits [1:0], a directory or table entry's type field.
    pub const TYPE_MASK: u32 = Self::COARSE.bits() | Self::SECTION_OR_PAGE.bits();
}

/// Bits 0-1 of a directory or table entry: its type (section, coarse
/// page table, or page-table-entry-with-subpages-disabled).
pub const PE_TYPES: u32 = PteFlags::TYPE_MASK;
/// First-level entry pointing at a coarse (1 KiB) second-level table.
pub const UPDE_TYPE: u32 = PteFlags::COARSE.bits();
/// First-level entry describing a 1 MiB section mapping directly.
pub const KPDE_TYPE: u32 = PteFlags::SECTION_OR_PAGE.bits();
/// Second-level entry describing a 4 KiB small page (subpages disabled).
pub const PTE_TYPE: u32 = PteFlags::SECTION_OR_PAGE.bits();

pub const PE_CACHE: u32 = PteFlags::CACHEABLE.bits();
pub const PE_BUF: u32 = PteFlags::BUFFERED.bits();

/// Access-permission field shared by section and page entries
/// (spec.md's abstract 2-bit "ap" value), placed at bits [5:4] of the
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum Ap {
    /// Any access faults.
    NoAccess = 0x0,
    /// Kernel read/write, user: no access.
    KernelOnly = 0x1,
    /// Kernel read/write, user: read-only.
    KernelRwUserRo = 0x2,
    /// Kernel and user: read/write.
    KernelUser = 0x3,
}

impl Ap {
    pub const fn bits(self) -> u32 {
        (self as u32) << 4
    }

    pub const fn from_entry(raw: u32) -> Self {
        match (raw >> 4) & 0x3 {
            0x0 => Ap::NoAccess,
            0x1 => Ap::KernelOnly,
            0x2 => Ap::KernelRwUserRo,
            _ => Ap::KernelUser,
        }
    }
}

/// A first-level or second-level ARM page table, generic over its entry
/// count `N`. Two shapes of this crate's tables share identical layout
/// and accessors:
///
/// - `N = 256` (1 KiB): a second-level table mapping 4 KiB pages, *or*
///   a process's user root directory (TTBR0) — spec.md §3 gives both
///   exactly 256 entries, and both come from the same `kpt_alloc` slab.
/// - `N = 4096` (16 KiB): the kernel's single global root directory
///   (TTBR1, `KernelPageDirectory`), which covers the full 4 GiB address
///   range since it is never truncated by TTBCR.N the way TTBR0's table
///   is.
///
/// Keeping one generic type (rather than two unrelated structs) means
/// `walk`/`map` in `mm::vmm` are written once and are correct for both
/// root sizes — the only thing that differs is how many bits of `va`
/// the first-level index consumes, which falls out of `N` automatically.
#[repr(C)]
pub struct Table<const N: usize> {
    entries: [u32; N],
}

pub type PageTable = Table<NUM_PTE>;
pub type PageDirectory = Table<NUM_PTE>;
/// The kernel's single global first-level directory (spec.md §3: "a
/// 16 KiB table of 4,096 32-bit entries"), reached through TTBR1.
pub type KernelPageDirectory = Table<4096>;

impl<const N: usize> Table<N> {
    pub fn entry(&self, index: usize) -> u32 {
        self.entries[index]
    }

    pub fn set_entry(&mut self, index: usize, raw: u32) {
        self.entries[index] = raw;
    }

    pub fn is_present(&self, index: usize) -> bool {
        self.entries[index] & PE_TYPES != 0
    }

    /// Physical address of the second-level table a coarse entry points
    /// to (1 KiB aligned).
    pub fn coarse_table_addr(&self, index: usize) -> usize {
        (self.entries[index] as usize) & !(PT_SIZE - 1)
    }

    /// Physical frame address a leaf entry maps to (4 KiB aligned).
    pub fn leaf_frame_addr(&self, index: usize) -> usize {
        (self.entries[index] as usize) & !(PAGE_SIZE - 1)
    }

    pub fn leaf_ap(&self, index: usize) -> Ap {
        Ap::from_entry(self.entries[index])
    }

    pub fn set_coarse(&mut self, index: usize, table_pa: usize) {
        self.entries[index] = (table_pa as u32) | UPDE_TYPE;
    }

    /// Install a 1 MiB section entry (spec.md §4.3 boot sections, §4.6
    /// "section type for kernel regions"). Only ever used on a
    /// `KernelPageDirectory`; a user root directory is always coarse.
    pub fn set_section(&mut self, index: usize, section_pa: usize, ap: Ap, cacheable: bool) {
        let mut raw = (section_pa as u32) | ap.bits() | KPDE_TYPE;
        if cacheable {
            raw |= PE_CACHE | PE_BUF;
        }
        self.entries[index] = raw;
    }

    pub fn set_leaf(&mut self, index: usize, frame_pa: usize, ap: Ap) {
        self.entries[index] = (frame_pa as u32) | ap.bits() | PE_CACHE | PE_BUF | PTE_TYPE;
    }

    pub fn clear_entry(&mut self, index: usize) {
        self.entries[index] = 0;
    }

    pub fn zero(&mut self) {
        for e in self.entries.iter_mut() {
            *e = 0;
        }
    }
}

struct PtPool {
    /// Head of the intrusive free list (kernel virtual address of the
    /// first free 1 KiB block), or 0 if empty.
    head: usize,
}

impl PtPool {
    const fn new() -> Self {
        Self { head: 0 }
    }

    unsafe fn next_of(kva: usize) -> usize {
        // SAFETY: caller holds a block this allocator considers free.
        unsafe { ptr::read(kva as *const usize) }
    }

    unsafe fn set_next(kva: usize, next: usize) {
        // SAFETY: see above.
        unsafe { ptr::write(kva as *mut usize, next) };
    }

    fn push(&mut self, kva: usize) {
        // SAFETY: `kva` is being handed to the free list by its owner.
        unsafe { Self::set_next(kva, self.head) };
        self.head = kva;
    }

    fn pop(&mut self) -> Option<usize> {
        if self.head == 0 {
            return None;
        }
        let block = self.head;
        // SAFETY: `block` is this list's live head.
        self.head = unsafe { Self::next_of(block) };
        Some(block)
    }

    /// Remove `target` from the free list if present.
    fn remove(&mut self, target: usize) -> bool {
        if self.head == target {
            // SAFETY: `target` is this list's live head.
            self.head = unsafe { Self::next_of(target) };
            return true;
        }
        let mut prev = self.head;
        while prev != 0 {
            // SAFETY: `prev` is a live free block on this list.
            let next = unsafe { Self::next_of(prev) };
            if next == target {
                // SAFETY: `target` is a live free block on this list.
                let after = unsafe { Self::next_of(target) };
                unsafe { Self::set_next(prev, after) };
                return true;
            }
            prev = next;
        }
        false
    }

    /// Is `target` currently on the free list?
    fn contains(&self, target: usize) -> bool {
        let mut cur = self.head;
        while cur != 0 {
            if cur == target {
                return true;
            }
            // SAFETY: `cur` is a live free block on this list.
            cur = unsafe { Self::next_of(cur) };
        }
        false
    }
}

// SAFETY: the raw addresses inside `PtPool` are only dereferenced while
// `KPT_POOL`'s mutex is held.
unsafe impl Send for PtPool {}

static KPT_POOL: Mutex<PtPool> = Mutex::new(PtPool::new());

/// Seed the boot pool with every 1 KiB block in the kernel-virtual range
/// `[lo, hi)`. Called once during boot over memory the linker/boot code
/// reserved for page tables, before the frame allocator is initialised
/// (spec.md §4.3, §4.5).
pub fn kpt_freerange(lo: usize, hi: usize) {
    let mut pool = KPT_POOL.lock();
    let mut kva = lo;
    while kva + PT_SIZE <= hi {
        pool.push(kva);
        kva += PT_SIZE;
    }
}

/// Allocate one zeroed 1 KiB page-table-sized block.
pub fn kpt_alloc() -> KernelResult<*mut PageDirectory> {
    let kva = {
        let mut pool = KPT_POOL.lock();
        match pool.pop() {
            Some(kva) => kva,
            None => {
                drop(pool);
                // Boot pool exhausted: pull a whole frame from the buddy
                // allocator and slab it into four quarters, keeping one
                // and pushing the rest onto the free list.
                let pa = FRAME_ALLOCATOR.kmalloc(0)?;
                let base = p2v(pa);
                let mut pool = KPT_POOL.lock();
                for i in 1..4 {
                    pool.push(base + i * PT_SIZE);
                }
                base
            }
        }
    };
    // SAFETY: `kva` is a freshly taken 1 KiB block this allocator owns
    // exclusively until returned to the caller.
    unsafe { ptr::write_bytes(kva as *mut u8, 0, PT_SIZE) };
    Ok(kva as *mut PageDirectory)
}

/// Return a 1 KiB block to the pool. If it was sliced from a
/// buddy-sourced frame (physical address `>= INIT_KERNMAP`) and its
/// three siblings are also currently free, all four are pulled off the
/// list and the whole frame is handed back to the buddy allocator.
pub fn kpt_free(pt: *mut PageDirectory) {
    let kva = pt as usize;
    // SAFETY: the caller is relinquishing this block; nothing else holds
    // a live reference to it.
    unsafe { ptr::write_bytes(kva as *mut u8, 0, PT_SIZE) };

    let pa = v2p(kva);
    let mut pool = KPT_POOL.lock();
    pool.push(kva);

    if pa < INIT_KERNMAP {
        // Boot-pool block: stays on the slab free list forever: there is
        // no backing frame to return it to.
        return;
    }

    let frame_base_pa = align_down(pa, PAGE_SIZE);
    let siblings: [usize; 4] = core::array::from_fn(|i| p2v(frame_base_pa) + i * PT_SIZE);
    if siblings.iter().all(|&kva| pool.contains(kva)) {
        for &kva in siblings.iter() {
            pool.remove(kva);
        }
        drop(pool);
        FRAME_ALLOCATOR.kfree(frame_base_pa, 0);
    }
}

/// Error returned when a pointer handed to `kpt_free` fails a sanity
/// check. Not currently raised — kept so callers composing with
/// `KernelResult` have a named type to propagate if validation is added.
#[allow(dead_code)]
pub fn invalid_pt_pointer() -> KernelError {
    KernelError::InvalidFrame
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn alloc_zeroes_and_frees_to_boot_pool() {
        let mut boot_pool = [0xAAu8; 4 * 1024];
        let base = boot_pool.as_mut_ptr() as usize;
        kpt_freerange(base, base + 4 * 1024);

        let pt = kpt_alloc().expect("boot pool has blocks");
        // SAFETY: freshly allocated, exclusively owned here.
        let pd = unsafe { &*pt };
        assert_eq!(pd.entry(0), 0);

        kpt_free(pt);
    }
}
