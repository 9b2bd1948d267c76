//! Bootable image entry point.
//!
//! Declares its own copy of the module tree rather than depending on
//! the `xv6_arm_kernel` library crate: the real entry point is the
//! `_start` symbol `arch::arm::boot`'s `global_asm!` emits, and a
//! hand-written linker script has no way to ask cargo's linker
//! invocation to retain an otherwise-unreferenced object file out of
//! an external rlib. Compiling the same files directly into this
//! binary crate sidesteps the question entirely. The library crate
//! (`lib.rs`) exists purely so `mm`, `sync`, and `irq` build and
//! unit-test on a host target.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

#[macro_use]
mod console;

mod arch;
mod boot_sequence;
mod error;
mod glue;
mod irq;
mod klog;
mod layout;
mod mm;
mod process;
mod sync;

// `arch::arm::boot`'s `rust_high_entry` resolves `crate::kmain` against
// this re-export.
use boot_sequence::kmain;

/// Bounded-depth call-stack reconstruction for the panic path
/// (`examples/original_source/src/arm.c`'s `getcallerpcs`/
/// `show_callstk`): walk the ARM `push {fp, lr}; add fp, sp, #4`
/// frame-pointer chain starting from the current `r11`, printing each
/// return address until the chain breaks or `MAX_FRAMES` is reached.
const MAX_FRAMES: usize = 16;

fn print_backtrace() {
    println!("backtrace:");
    let mut fp = arch::arm::cpu::get_fp();
    for depth in 0..MAX_FRAMES {
        if fp == 0 || fp % 4 != 0 {
            break;
        }
        // SAFETY: `fp` is either the current r11 (valid by construction)
        // or a value read from the previous frame's saved-fp slot; we stop
        // as soon as either load would be misaligned or null, which is
        // the same bailout `show_callstk` uses for an unrecognizable
        // frame. With `fp` pointing at the saved-`lr` word (the
        // `push {fp, lr}; add fp, sp, #4` prologue), `lr` lives at
        // `fp[0]` and the caller's saved `fp` at `fp[-1]`.
        let (saved_fp, lr) = unsafe {
            let base = fp as *const u32;
            (*base.offset(-1) as usize, *base.offset(0) as usize)
        };
        println!("  #{depth}: {lr:#010x}");
        if saved_fp <= fp {
            break;
        }
        fp = saved_fp;
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("[KERNEL PANIC] {info}");
    print_backtrace();
    arch::arm::cpu::cli();
    loop {
        // SAFETY: `wfi` has no preconditions.
        unsafe { core::arch::asm!("wfi", options(nomem, nostack, preserves_flags)) };
    }
}
