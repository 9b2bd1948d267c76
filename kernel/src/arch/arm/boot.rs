//! Early boot (spec.md §4.3), grounded in
//! `examples/original_source/src/start.c`'s `start`/`set_bootpgtbl`/
//! `load_pgtlb` and `src/main.c`'s `kmain` call order.
//!
//! Runs with the MMU off, executing at a low physical address. Builds
//! the two provisional root page tables the linker script reserves,
//! installs them, enables the MMU, and falls through to a stack and PC
//! in high-half virtual memory. No source for the raw entry/stack-jump
//! assembly survived retrieval (`examples/original_source`'s `entry.S`
//! was not part of the kept file set — see its `_INDEX.md`), so the
//! `global_asm!` blocks below are this crate's own, built to carry out
//! exactly the steps `start.c` describes in C.

use core::arch::global_asm;

use crate::layout::{DEVBASE, DEV_MEM_SZ, INIT_KERNMAP, KERNBASE, PDE_SHIFT, UADDR_BITS, VEC_TBL};
use crate::mm::page_table::{Ap, KernelPageDirectory};

unsafe extern "C" {
    /// 16 KiB, naturally aligned, reserved by `link.ld` (spec.md §6).
    /// Becomes the kernel's permanent TTBR1 directory.
    static mut _kernel_pgtbl: KernelPageDirectory;
    /// 16 KiB, naturally aligned, reserved by `link.ld`. Only its first
    /// `NUM_UPDE` entries are ever populated by boot code; it serves as
    /// TTBR0 until the first real process directory is installed by
    /// `mm::vmm::switchuvm`.
    static mut _user_pgtbl: KernelPageDirectory;
    /// First byte past the kernel's loaded image (spec.md §6).
    static end: u8;
    /// Start of the data segment; `[edata, end)` is BSS, zeroed once the
    /// MMU is live and the high-half alias of that range is the one
    /// future writes will use.
    static edata: u8;
}

/// Install one 1 MiB section entry per 1 MiB-aligned chunk of
/// `[va, va + len)`, choosing the user or kernel root directory by
/// whichever one TTBCR.N will route that `va` through at runtime —
/// `examples/original_source/src/start.c`'s `set_bootpgtbl`. `dev_mem`
/// selects non-cacheable, non-bufferable MMIO framing over ordinary
/// cacheable/bufferable memory.
///
/// # Safety
/// Must run before the MMU is enabled, with exclusive access to both
/// root directories (single-threaded boot).
unsafe fn set_bootpgtbl(
    user_dir: &mut KernelPageDirectory,
    kernel_dir: &mut KernelPageDirectory,
    va: usize,
    pa: usize,
    len: usize,
    dev_mem: bool,
) {
    let num_upde = 1usize << (UADDR_BITS - PDE_SHIFT);
    let mut vidx = va >> PDE_SHIFT;
    let mut pidx = pa >> PDE_SHIFT;
    let count = len >> PDE_SHIFT;
    for _ in 0..count {
        let section_pa = pidx << PDE_SHIFT;
        // Boot sections are always kernel-only access; user code never
        // runs until a process directory replaces this provisional one.
        if vidx < num_upde {
            user_dir.set_section(vidx, section_pa, Ap::KernelOnly, !dev_mem);
        } else {
            kernel_dir.set_section(vidx, section_pa, Ap::KernelOnly, !dev_mem);
        }
        vidx += 1;
        pidx += 1;
    }
}

/// Build the provisional identity + high-half + vectors + device
/// mappings, program the TTBRs and TTBCR.N, set the domain access
/// control register, and enable the MMU (spec.md §4.3, steps 1-4 plus
/// "Boot then writes the domain-access control register ... programs
/// TTBR0 and TTBR1, sets the MMU-enable ... bits ... flushes the TLB").
/// Does not itself jump to the high-half stack; the caller
/// (`rust_boot_entry`) does that once this returns.
///
/// # Safety
/// Must run exactly once, single-threaded, with the MMU currently off
/// and `_kernel_pgtbl`/`_user_pgtbl` not yet referenced by any live
/// translation.
pub unsafe fn init_boot_page_tables() {
    // SAFETY: single boot thread, MMU not yet enabled, exclusive access
    // to both linker-reserved tables.
    unsafe {
        let kdir = &mut *core::ptr::addr_of_mut!(_kernel_pgtbl);
        let udir = &mut *core::ptr::addr_of_mut!(_user_pgtbl);
        kdir.zero();
        udir.zero();

        // 1. Identity-map the first 1 MiB so boot code keeps running.
        set_bootpgtbl(udir, kdir, 0, 0, INIT_KERNMAP, false);
        // 2. Map the kernel's high-half link address to the same 1 MiB.
        set_bootpgtbl(udir, kdir, KERNBASE, 0, INIT_KERNMAP, false);
        // 3. Map the high-vectors window to physical 0.
        let vec_section = VEC_TBL & !((1usize << PDE_SHIFT) - 1);
        set_bootpgtbl(udir, kdir, vec_section, 0, 1 << PDE_SHIFT, false);
        // 4. Map device MMIO non-cacheable, non-bufferable.
        set_bootpgtbl(udir, kdir, KERNBASE + DEVBASE, DEVBASE, DEV_MEM_SZ, true);

        crate::arch::arm::mmu::set_dacr_client_all();
        crate::arch::arm::mmu::set_ttbcr_n((32 - UADDR_BITS) as u32);
        crate::arch::arm::mmu::set_ttbr1(core::ptr::addr_of!(_kernel_pgtbl) as usize);
        crate::arch::arm::mmu::set_ttbr0(core::ptr::addr_of!(_user_pgtbl) as usize);
        crate::arch::arm::mmu::enable_mmu();
        crate::arch::arm::mmu::flush_tlb();
    }
}

/// Zero the BSS segment (`[edata, end)`), once writes go through the
/// high-half virtual alias (`examples/original_source/src/start.c`'s
/// `clear_bss`).
///
/// # Safety
/// Must run after the MMU is enabled and before anything reads static
/// mutable state.
pub unsafe fn clear_bss() {
    let start = core::ptr::addr_of!(edata) as usize;
    let stop = core::ptr::addr_of!(end) as usize;
    // SAFETY: `[start, stop)` is this image's BSS, reserved by the
    // linker script and not yet read by anything at this point in boot.
    unsafe { core::ptr::write_bytes(start as *mut u8, 0, stop - start) };
}

// Low-level entry: set a provisional stack (physical, identity-mapped;
// reserved by `link.ld` as `boot_stack_top`) and fall into
// `rust_boot_entry`. ARM enters SVC mode with interrupts masked on
// reset, matching spec.md §4.7's precondition that mode switches during
// boot never need to manage the interrupt-mask bit themselves.
global_asm!(
    r#"
.section .text.boot
.global _start
_start:
    ldr sp, =boot_stack_top
    ldr r0, =0x80000000
    sub sp, sp, r0
    bl rust_boot_entry
1:  wfi
    b 1b
"#
);

// High-half handoff: once `rust_boot_entry` has enabled the MMU, switch
// the stack pointer to the high-half supervisor stack `link.ld`
// reserves at `svc_stktop` and branch to `rust_high_entry`. This is the
// "critical sequence" spec.md §9 flags as non-reentrant: the identity
// map and the high-half map are both live until this instruction
// completes.
global_asm!(
    r#"
.global jump_stack
jump_stack:
    ldr sp, =svc_stktop
    ldr pc, =rust_high_entry
"#
);

unsafe extern "C" {
    pub fn jump_stack() -> !;
}

#[no_mangle]
extern "C" fn rust_boot_entry() -> ! {
    // SAFETY: the sole boot thread, MMU currently off.
    unsafe { init_boot_page_tables() };
    // SAFETY: falls through to the high-half entry point below, never
    // returning to the low-half caller.
    unsafe { jump_stack() };
}

#[no_mangle]
extern "C" fn rust_high_entry() -> ! {
    // SAFETY: MMU is live, stack and PC are both in high-half virtual
    // memory; nothing has read static mutable state yet.
    unsafe { clear_bss() };
    crate::kmain();
}
