//! The `kmain` boot sequence, included as a module by both compilation
//! units that make up this crate: the `kernel` binary (`main.rs`, the
//! image actually flashed) and the `xv6_arm_kernel` library (`lib.rs`,
//! built on a host target for unit tests, but which also compiles this
//! module when built for `target_arch = "arm"` since `arch::arm::boot`
//! is unconditionally reachable there too). Kept as its own file so the
//! sequencing logic exists exactly once regardless of which crate root
//! `crate::kmain` resolves against.

/// Bring up the subsystems this crate owns, in the order
/// `examples/original_source/src/main.c`'s `kmain` establishes them:
/// logging first (so every later step can `log::info!`), then the
/// allocators, then the MMU's steady-state direct map, then the trap
/// vectors and per-mode stacks. Called once from `arch::arm::boot`'s
/// `rust_high_entry`, with the MMU live and a valid high-half stack.
#[cfg(target_arch = "arm")]
pub fn kmain() -> ! {
    crate::klog::init();
    log::info!("xv6-arm-rs kernel starting");

    unsafe extern "C" {
        static _kpt_boot_pool_start: u8;
        static _kpt_boot_pool_end: u8;
        static mut _kernel_pgtbl: crate::mm::page_table::KernelPageDirectory;
    }
    // SAFETY: these symbols are reserved by `link.ld` and not read before
    // this point; `kmain` runs exactly once, single-threaded.
    let (pool_lo, pool_hi) = unsafe {
        (
            crate::layout::v2p(core::ptr::addr_of!(_kpt_boot_pool_start) as usize),
            crate::layout::v2p(core::ptr::addr_of!(_kpt_boot_pool_end) as usize),
        )
    };
    crate::mm::init(
        (pool_lo, pool_hi),
        (crate::layout::INIT_KERNMAP, crate::layout::PHYSTOP),
    );

    // SAFETY: `_kernel_pgtbl` is the directory `boot` already installed as
    // TTBR1; widening its direct map in place keeps that installation
    // valid rather than replacing it.
    let kpgdir = unsafe { &mut *core::ptr::addr_of_mut!(_kernel_pgtbl) };
    crate::mm::paging_init(kpgdir, crate::layout::INIT_KERNMAP, crate::layout::PHYSTOP)
        .expect("paging_init: failed to extend the kernel direct map");

    crate::arch::arm::trap::init_mode_stacks();
    // SAFETY: `VEC_TBL` is already mapped by the boot page tables.
    unsafe { crate::arch::arm::trap::install_vectors() };

    log::info!("boot complete, idling (scheduler out of scope)");
    loop {
        crate::arch::arm::cpu::sti();
        // SAFETY: `wfi` has no preconditions; it simply suspends the core
        // until the next interrupt.
        unsafe { core::arch::asm!("wfi", options(nomem, nostack, preserves_flags)) };
    }
}
