//! Low-level CPU primitives (spec.md §4.1), grounded in
//! `examples/original_source/src/arm.c`.
//!
//! These are the only functions in the crate that read or write the CPSR
//! directly. `sync::cli`'s `pushcli`/`popcli` and `mm::vmm::switchuvm`
//! build on top of them but never touch the register themselves — the
//! interrupt-mask bit here is the single source of truth for "interrupts
//! enabled"; nothing in this crate keeps a software mirror of it on the
//! real target. The host build (see `arch::arm`'s module doc) swaps in a
//! software-mirrored flag purely so `sync::cli`'s tests have something
//! to observe off real hardware.

use crate::arch::arm::regs::Mode;

#[cfg(target_arch = "arm")]
mod hw {
    use core::arch::asm;

    use crate::arch::arm::regs::{Mode, DIS_INT};

    /// Disable IRQ (set the CPSR's I-bit).
    #[inline]
    pub fn cli() {
        // SAFETY: a `cpsr_c` write only touches the control field (mode +
        // interrupt masks); this call does not change the current mode.
        unsafe {
            let mut val: u32;
            asm!("mrs {0}, cpsr", out(reg) val);
            val |= DIS_INT;
            asm!("msr cpsr_c, {0}", in(reg) val);
        }
    }

    /// Enable IRQ (clear the CPSR's I-bit).
    #[inline]
    pub fn sti() {
        // SAFETY: see `cli`.
        unsafe {
            let mut val: u32;
            asm!("mrs {0}, cpsr", out(reg) val);
            val &= !DIS_INT;
            asm!("msr cpsr_c, {0}", in(reg) val);
        }
    }

    /// Is IRQ currently enabled?
    #[inline]
    pub fn int_enabled() -> bool {
        // SAFETY: a bare `mrs` read has no preconditions.
        let val: u32 = unsafe {
            let mut v;
            asm!("mrs {0}, cpsr", out(reg) v);
            v
        };
        val & DIS_INT == 0
    }

    /// The CPSR a freshly created user process should resume in: USR mode,
    /// everything else inherited from the caller's current status.
    #[inline]
    pub fn spsr_usr() -> u32 {
        // SAFETY: see `cli`.
        let val: u32 = unsafe {
            let mut v;
            asm!("mrs {0}, cpsr", out(reg) v);
            v
        };
        (val & !Mode::MASK) | Mode::Usr as u32
    }

    /// The current frame pointer (r11 under the ARM EABI "push {fp, lr}"
    /// prologue convention the panic path's call-stack walk relies on).
    #[inline]
    pub fn get_fp() -> usize {
        let fp: usize;
        // SAFETY: reading r11 has no preconditions.
        unsafe { asm!("mov {0}, r11", out(reg) fp) };
        fp
    }

    /// Install `sp` as the banked stack pointer for `mode`, by switching
    /// into that mode with IRQ and FIQ masked, writing `sp`, and returning
    /// to the caller's mode (spec.md §4.1). Used once per non-supervisor
    /// mode during boot, before any of those modes' handlers can run
    /// (`examples/original_source/src/trap.c` `trap_init`).
    ///
    /// # Safety
    /// Must only be called during single-threaded boot, before interrupts
    /// are enabled; switching modes with a stale or in-use `sp` for `mode`
    /// would corrupt whatever that mode's handler is mid-way through.
    pub unsafe fn set_stk(mode: Mode, sp: usize) {
        // SAFETY: caller upholds the boot-time, interrupts-masked
        // precondition above; the mode switch only alters CPSR bits this
        // function itself restores before returning.
        unsafe {
            asm!(
                "mrs r2, cpsr",
                "bic r3, r2, #0x1f",
                "orr r3, r3, {mode}",
                "orr r3, r3, #0xc0",
                "msr cpsr_c, r3",
                "mov sp, {sp}",
                "msr cpsr_c, r2",
                mode = in(reg) mode as u32,
                sp = in(reg) sp,
                out("r2") _,
                out("r3") _,
            );
        }
    }
}

/// Host stand-in for the real CPSR, used only off `target_arch = "arm"`
/// so `sync::cli`'s pushcli/popcli tests exercise the same call surface
/// the real kernel does (spec.md §9 calls for the interrupt-mask bit to
/// be the single source of truth; a host test has no such bit, so this
/// mirrors it in a `Cell` instead — never compiled into the real image).
#[cfg(not(target_arch = "arm"))]
mod host {
    use core::cell::Cell;

    // Single-threaded host test binaries only; never linked into the
    // bare-metal image, where `hw` above is used instead.
    thread_local! {
        static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
    }

    pub fn cli() {
        IRQ_ENABLED.with(|c| c.set(false));
    }

    pub fn sti() {
        IRQ_ENABLED.with(|c| c.set(true));
    }

    pub fn int_enabled() -> bool {
        IRQ_ENABLED.with(|c| c.get())
    }

    pub fn spsr_usr() -> u32 {
        super::Mode::Usr as u32
    }

    pub fn get_fp() -> usize {
        0
    }

    /// # Safety
    /// No hardware precondition off `target_arch = "arm"`; kept `unsafe`
    /// to match the real signature callers compile against.
    pub unsafe fn set_stk(_mode: super::Mode, _sp: usize) {}
}

#[cfg(target_arch = "arm")]
use hw::{cli as cli_impl, get_fp as get_fp_impl, int_enabled as int_enabled_impl,
    set_stk as set_stk_impl, spsr_usr as spsr_usr_impl, sti as sti_impl};
#[cfg(not(target_arch = "arm"))]
use host::{cli as cli_impl, get_fp as get_fp_impl, int_enabled as int_enabled_impl,
    set_stk as set_stk_impl, spsr_usr as spsr_usr_impl, sti as sti_impl};

/// Disable IRQ (set the CPSR's I-bit).
#[inline]
pub fn cli() {
    cli_impl()
}

/// Enable IRQ (clear the CPSR's I-bit).
#[inline]
pub fn sti() {
    sti_impl()
}

/// Is IRQ currently enabled?
#[inline]
pub fn int_enabled() -> bool {
    int_enabled_impl()
}

/// The CPSR a freshly created user process should resume in: USR mode,
/// everything else inherited from the caller's current status.
#[inline]
pub fn spsr_usr() -> u32 {
    spsr_usr_impl()
}

/// The current frame pointer (r11 under the ARM EABI "push {fp, lr}"
/// prologue convention the panic path's call-stack walk relies on).
#[inline]
pub fn get_fp() -> usize {
    get_fp_impl()
}

/// Install `sp` as the banked stack pointer for `mode` (spec.md §4.1).
///
/// # Safety
/// Must only be called during single-threaded boot, before interrupts are
/// enabled; switching modes with a stale or in-use `sp` for `mode` would
/// corrupt whatever that mode's handler is mid-way through.
#[inline]
pub unsafe fn set_stk(mode: Mode, sp: usize) {
    // SAFETY: caller upholds this function's own documented precondition.
    unsafe { set_stk_impl(mode, sp) }
}
