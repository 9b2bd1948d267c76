//! Virtual memory layer (spec.md §4.6), grounded line-for-line in
//! `examples/original_source/src/vm.c`.
//!
//! Every operation here takes an explicit page directory rather than
//! reaching for "the current process" — the caller (usually `process`)
//! decides whose address space it means, exactly as the original's
//! functions take `pgdir` as their first argument. Most operations are
//! only ever exercised against a process's 256-entry user root
//! (`PageDirectory`), but `walk`/`map` are generic over the directory's
//! entry count so `mm::paging_init` can reuse them against the kernel's
//! 4096-entry global directory (`KernelPageDirectory`) too.

use crate::error::{KernelError, KernelResult};
use crate::layout::{
    align_down, align_up, p2v, v2p, NUM_PTE, NUM_UPDE, PAGE_SHIFT, PAGE_SIZE, PDE_SHIFT, UADDR_SZ,
};
use crate::mm::frame_allocator::FRAME_ALLOCATOR;
use crate::mm::page_table::{kpt_alloc, kpt_free, Ap, PageTable, Table, PE_BUF, PE_CACHE, PE_TYPES, PTE_TYPE};

/// First-level index for `va` in a directory of `N` entries. `N` is
/// always a power of two (256 for a user root, 4096 for the kernel's
/// global directory), so masking rather than dividing is exact for
/// both — this is what lets `walk`/`map` below serve both directory
/// sizes with one implementation (spec.md §4.6 describes the user-root
/// case; `mm::paging_init` is this function's only caller with a
/// `KernelPageDirectory`).
#[inline]
const fn pde_index<const N: usize>(va: usize) -> usize {
    (va >> PDE_SHIFT) & (N - 1)
}

#[inline]
const fn pte_index(va: usize) -> usize {
    (va >> PAGE_SHIFT) & (NUM_PTE - 1)
}

/// A source of bytes to load into a freshly-mapped user page — the
/// boundary `loaduvm` crosses into the (out-of-scope) file system's
/// `readi`. Test code and any future loader implement this directly
/// instead of this core depending on an inode type.
pub trait SegmentReader {
    /// Read `n` bytes starting at `offset` into the kernel-virtual
    /// destination `dest_kva`. Returns the number of bytes read; fewer
    /// than `n` is treated as a short read and fails the load.
    fn read(&self, dest_kva: usize, offset: usize, n: usize) -> KernelResult<usize>;
}

/// Returns a pointer to the PTE for `va` in `pgdir`, allocating an
/// intermediate second-level table if `alloc` and it doesn't yet exist.
fn walk<const N: usize>(pgdir: &mut Table<N>, va: usize, alloc: bool) -> KernelResult<*mut u32> {
    let pdx = pde_index::<N>(va);
    let table_kva = if pgdir.is_present(pdx) {
        p2v(pgdir.coarse_table_addr(pdx))
    } else {
        if !alloc {
            return Err(KernelError::UnmappedMemory { addr: va });
        }
        let table = kpt_alloc()?;
        let table_kva = table as usize;
        pgdir.set_coarse(pdx, v2p(table_kva));
        table_kva
    };
    // SAFETY: `table_kva` is either the coarse table `pgdir` already
    // points at, or one this call just allocated and installed; either
    // way it is a valid, exclusively-reachable `PageTable`.
    let table = unsafe { &mut *(table_kva as *mut PageTable) };
    let ptx = pte_index(va);
    Ok((table as *mut PageTable as *mut u32).wrapping_add(ptx))
}

/// Map `size` bytes starting at `va` to physical memory starting at
/// `pa`, with access permission `ap`. `va`/`size` need not be
/// page-aligned.
pub fn map<const N: usize>(
    pgdir: &mut Table<N>,
    va: usize,
    size: usize,
    pa: usize,
    ap: Ap,
) -> KernelResult<()> {
    let mut a = align_down(va, PAGE_SIZE);
    let last = align_down(va + size - 1, PAGE_SIZE);
    let mut pa = pa;
    loop {
        let pte = walk(pgdir, a, true)?;
        // SAFETY: `walk` returns a pointer into a table it just ensured
        // exists and is exclusively reachable through `pgdir`.
        let raw = unsafe { &mut *pte };
        assert!(
            *raw & PE_TYPES == 0,
            "map: va {a:#x} is already validly mapped (double-map is a kernel bug)"
        );
        *raw = (pa as u32) | ap.bits() | PE_CACHE | PE_BUF | PTE_TYPE;
        if a == last {
            break;
        }
        a += PAGE_SIZE;
        pa += PAGE_SIZE;
    }
    Ok(())
}

/// Load the initial process image at user virtual address 0. `init`
/// must be smaller than one page (spec.md §4.6, `inituvm`).
pub fn inituvm(pgdir: &mut PageDirectory, init: &[u8]) -> KernelResult<()> {
    assert!(init.len() < PAGE_SIZE, "inituvm: more than a page");
    let pa = FRAME_ALLOCATOR.alloc_page()?;
    let kva = p2v(pa);
    // SAFETY: `pa` was just allocated; nothing else can reach it yet.
    unsafe { core::ptr::write_bytes(kva as *mut u8, 0, PAGE_SIZE) };
    map(pgdir, 0, PAGE_SIZE, pa, Ap::KernelUser)?;
    // SAFETY: `kva` is the zeroed page just mapped above, `init.len() <
    // PAGE_SIZE`.
    unsafe { core::ptr::copy_nonoverlapping(init.as_ptr(), kva as *mut u8, init.len()) };
    Ok(())
}

/// Load a program segment into already-mapped pages starting at
/// page-aligned `addr` (spec.md §4.6, `loaduvm`).
pub fn loaduvm(
    pgdir: &mut PageDirectory,
    addr: usize,
    reader: &dyn SegmentReader,
    offset: usize,
    sz: usize,
) -> KernelResult<()> {
    assert!(addr % PAGE_SIZE == 0, "loaduvm: addr must be page aligned");
    let mut i = 0;
    while i < sz {
        let pte = walk(pgdir, addr + i, false)?;
        // SAFETY: `walk` with `alloc=false` returns a pointer to an
        // existing entry whenever it returns `Ok`.
        let raw = unsafe { *pte };
        if raw & PE_TYPES == 0 {
            return Err(KernelError::UnmappedMemory { addr: addr + i });
        }
        let pa = (raw as usize) & !(PAGE_SIZE - 1);
        let n = (sz - i).min(PAGE_SIZE);
        let got = reader.read(p2v(pa), offset + i, n)?;
        if got != n {
            return Err(KernelError::InvalidAddress { addr: addr + i });
        }
        i += PAGE_SIZE;
    }
    Ok(())
}

/// Grow a process from `oldsz` to `newsz`, allocating and mapping pages
/// for the new range. Returns the new size, or rolls back to `oldsz`
/// and returns the sentinel 0 on failure (spec.md §4.6, `allocuvm`).
pub fn allocuvm(pgdir: &mut PageDirectory, oldsz: usize, newsz: usize) -> usize {
    if newsz >= UADDR_SZ {
        return 0;
    }
    if newsz < oldsz {
        return oldsz;
    }

    let mut a = align_up(oldsz, PAGE_SIZE);
    while a < newsz {
        match FRAME_ALLOCATOR.alloc_page() {
            Ok(pa) => {
                let kva = p2v(pa);
                // SAFETY: `pa` was just allocated.
                unsafe { core::ptr::write_bytes(kva as *mut u8, 0, PAGE_SIZE) };
                if map(pgdir, a, PAGE_SIZE, pa, Ap::KernelUser).is_err() {
                    FRAME_ALLOCATOR.free_page(pa);
                    deallocuvm(pgdir, a, oldsz);
                    return 0;
                }
            }
            Err(_) => {
                deallocuvm(pgdir, a, oldsz);
                return 0;
            }
        }
        a += PAGE_SIZE;
    }
    newsz
}

/// Shrink a process from `oldsz` to `newsz`, freeing pages in the
/// vacated range (spec.md §4.6, `deallocuvm`). `oldsz` may exceed the
/// process's actual mapped size.
pub fn deallocuvm(pgdir: &mut PageDirectory, oldsz: usize, newsz: usize) -> usize {
    if newsz >= oldsz {
        return oldsz;
    }

    let mut a = align_up(newsz, PAGE_SIZE);
    while a < oldsz {
        match walk(pgdir, a, false) {
            Err(_) => {
                // No second-level table for this region at all: skip to
                // the next page-directory entry's worth of address space.
                a = align_up(a + 1, 1 << PDE_SHIFT);
                continue;
            }
            Ok(pte) => {
                // SAFETY: `walk` returned `Ok`, so `pte` addresses a live
                // entry inside a table reachable from `pgdir`.
                let raw = unsafe { *pte };
                if raw & PE_TYPES != 0 {
                    let pa = (raw as usize) & !(PAGE_SIZE - 1);
                    assert!(pa != 0, "deallocuvm: mapped entry with null frame");
                    FRAME_ALLOCATOR.free_page(pa);
                    // SAFETY: same pointer as above.
                    unsafe { *pte = 0 };
                }
            }
        }
        a += PAGE_SIZE;
    }
    newsz
}

/// Free a page directory and every page table and physical page it
/// reaches (spec.md §4.6, `freevm`). Only ever called on a process's
/// user root: unlike `walk`/`map`, this one is tied to the 1 KiB slab
/// size `kpt_alloc`/`kpt_free` hand out, so it stays monomorphic over
/// `PageDirectory` (`Table<256>`) rather than generic over `N`.
pub fn freevm(pgdir: &mut PageDirectory) {
    deallocuvm(pgdir, UADDR_SZ, 0);

    for i in 0..NUM_UPDE {
        if pgdir.is_present(i) {
            let table_pa = pgdir.coarse_table_addr(i);
            kpt_free(p2v(table_pa) as *mut PageTable);
        }
    }
    kpt_free(pgdir as *mut PageDirectory);
}

/// Clear the user-accessible bit on the PTE for `uva`, trapping accesses
/// below a process's stack guard page (spec.md §4.6, `clearpteu`).
pub fn clearpteu(pgdir: &mut PageDirectory, uva: usize) -> KernelResult<()> {
    let pte = walk(pgdir, uva, false)?;
    // SAFETY: `walk` returned `Ok`.
    let raw = unsafe { &mut *pte };
    *raw = (*raw & !(0x3 << 4)) | Ap::KernelOnly.bits();
    Ok(())
}

/// Duplicate a process's address space (no copy-on-write — spec.md's
/// Non-goals explicitly exclude it), returning the new root directory.
pub fn copyuvm(pgdir: &mut PageDirectory, sz: usize) -> KernelResult<*mut PageDirectory> {
    let d = kpt_alloc()?;
    // SAFETY: freshly allocated and zeroed by `kpt_alloc`.
    let dd = unsafe { &mut *d };

    let mut i = 0;
    let result: KernelResult<()> = (|| {
        while i < sz {
            let pte = walk(pgdir, i, false)?;
            // SAFETY: `walk` returned `Ok`.
            let raw = unsafe { *pte };
            if raw & PE_TYPES == 0 {
                return Err(KernelError::UnmappedMemory { addr: i });
            }
            let src_pa = (raw as usize) & !(PAGE_SIZE - 1);
            let ap = Ap::from_entry(raw);

            let dst_pa = FRAME_ALLOCATOR.alloc_page()?;
            // SAFETY: `src_pa`/`dst_pa` are both live, disjoint,
            // page-sized kernel-direct-mapped frames.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    p2v(src_pa) as *const u8,
                    p2v(dst_pa) as *mut u8,
                    PAGE_SIZE,
                )
            };
            map(dd, i, PAGE_SIZE, dst_pa, ap)?;
            i += PAGE_SIZE;
        }
        Ok(())
    })();

    if let Err(e) = result {
        freevm(dd);
        return Err(e);
    }
    Ok(d)
}

/// Translate a user virtual address to its kernel-virtual alias, only
/// succeeding for pages mapped with full user access (spec.md §4.6,
/// `uva2ka`).
pub fn uva2ka(pgdir: &mut PageDirectory, uva: usize) -> Option<usize> {
    let pte = walk(pgdir, uva, false).ok()?;
    // SAFETY: `walk` returned `Ok`.
    let raw = unsafe { *pte };
    if raw & PE_TYPES == 0 {
        return None;
    }
    if Ap::from_entry(raw) != Ap::KernelUser {
        return None;
    }
    Some(p2v((raw as usize) & !(PAGE_SIZE - 1)))
}

/// Copy `buf` into user address space at `va`, crossing page boundaries
/// as needed (spec.md §4.6, `copyout`).
pub fn copyout(pgdir: &mut PageDirectory, mut va: usize, buf: &[u8]) -> KernelResult<()> {
    let mut remaining = buf.len();
    let mut src = buf.as_ptr();
    while remaining > 0 {
        let va0 = align_down(va, PAGE_SIZE);
        let pa0 = uva2ka(pgdir, va0).ok_or(KernelError::InvalidAddress { addr: va0 })?;
        let n = (PAGE_SIZE - (va - va0)).min(remaining);
        // SAFETY: `pa0` is a live user page, `va - va0 + n <= PAGE_SIZE`.
        unsafe {
            core::ptr::copy_nonoverlapping(src, (pa0 + (va - va0)) as *mut u8, n);
            src = src.add(n);
        }
        remaining -= n;
        va = va0 + PAGE_SIZE;
    }
    Ok(())
}

/// Switch TTBR0 to `pgdir`'s physical address and flush the TLB
/// (spec.md §4.6, `switchuvm`). Disables interrupts for the duration: a
/// partially-switched TTBR0 must never be observed by an interrupt
/// handler running on behalf of the outgoing process.
pub fn switchuvm(pgdir: *mut PageDirectory) {
    crate::sync::pushcli();
    assert!(!pgdir.is_null(), "switchuvm: no pgdir");
    let pa = v2p(pgdir as usize);
    // SAFETY: `pa` is a live user page directory's physical address.
    unsafe { crate::arch::arm::mmu::set_ttbr0(pa) };
    crate::arch::arm::mmu::flush_tlb();
    crate::sync::popcli();
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;
    use crate::mm::page_table::kpt_freerange;

    #[repr(align(1024))]
    struct AlignedBlock([u8; 1024]);

    // Both the buddy allocator and the page-table slab allocator thread
    // their free lists through the memory they manage (dereferenced via
    // `p2v`), so host tests need real backing storage rather than
    // invented addresses. One 'static arena is carved in half and seeded
    // exactly once; tests only ever allocate from it, never re-init it,
    // so concurrently-run tests hand out disjoint blocks instead of
    // racing to reset shared state.
    #[repr(align(65536))]
    struct Arena([u8; 1 << 20]);
    static mut BACKING: Arena = Arena([0; 1 << 20]);
    static POOLS_READY: std::sync::Once = std::sync::Once::new();

    fn ensure_pools() {
        POOLS_READY.call_once(|| {
            // SAFETY: `Once::call_once` runs this exactly one time before
            // any test proceeds past it; nothing else touches `BACKING`.
            let base = unsafe { core::ptr::addr_of_mut!(BACKING) as usize };
            let half = (1 << 20) / 2;
            FRAME_ALLOCATOR.init(v2p(base), v2p(base) + half);
            kpt_freerange(base + half, base + (1 << 20));
        });
    }

    #[test]
    fn map_then_walk_round_trip() {
        ensure_pools();
        let mut dir_storage = AlignedBlock([0u8; 1024]);
        // SAFETY: `dir_storage` is a freshly zeroed, exclusively owned
        // 1 KiB block, large enough for a `PageDirectory`.
        let pgdir = unsafe { &mut *(dir_storage.0.as_mut_ptr() as *mut PageDirectory) };
        let pa = FRAME_ALLOCATOR.alloc_page().unwrap();
        map(pgdir, 0x1000, PAGE_SIZE, pa, Ap::KernelUser).unwrap();
        let got = uva2ka(pgdir, 0x1000).expect("page mapped with AP_KU is readable");
        assert_eq!(got, p2v(pa));
    }

    #[test]
    #[should_panic(expected = "double-map")]
    fn double_map_panics() {
        ensure_pools();
        let mut dir_storage = AlignedBlock([0u8; 1024]);
        // SAFETY: see `map_then_walk_round_trip`.
        let pgdir = unsafe { &mut *(dir_storage.0.as_mut_ptr() as *mut PageDirectory) };
        let pa = FRAME_ALLOCATOR.alloc_page().unwrap();
        map(pgdir, 0, PAGE_SIZE, pa, Ap::KernelUser).unwrap();
        let pa2 = FRAME_ALLOCATOR.alloc_page().unwrap();
        let _ = map(pgdir, 0, PAGE_SIZE, pa2, Ap::KernelUser);
    }

    #[test]
    fn clearpteu_removes_user_access() {
        ensure_pools();
        let mut dir_storage = AlignedBlock([0u8; 1024]);
        // SAFETY: see `map_then_walk_round_trip`.
        let pgdir = unsafe { &mut *(dir_storage.0.as_mut_ptr() as *mut PageDirectory) };
        let pa = FRAME_ALLOCATOR.alloc_page().unwrap();
        map(pgdir, 0x2000, PAGE_SIZE, pa, Ap::KernelUser).unwrap();
        assert!(uva2ka(pgdir, 0x2000).is_some());
        clearpteu(pgdir, 0x2000).unwrap();
        assert!(uva2ka(pgdir, 0x2000).is_none());
    }
}
