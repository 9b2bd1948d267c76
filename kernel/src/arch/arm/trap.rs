//! Trap/exception entry (spec.md §4.7), grounded in
//! `examples/original_source/src/trap.c`'s vector table and handler
//! functions, `src/arm.h`'s `struct trapframe`, and the frame-pointer
//! backtrace in `src/arm.c`.
//!
//! The assembly stubs below are this crate's own — the original's
//! `trapasm.S` was not part of the retrieved source — but they carry
//! out exactly the steps spec.md §4.7 lists, using the ARMv6+ `SRS`/`RFE`
//! instructions (store/restore return state) rather than hand-rolled
//! `mrs`/`msr cpsr_c` banked-register juggling: `srsdb` stashes the
//! current mode's adjusted `lr` and `spsr` directly onto the supervisor
//! stack from any mode, and the matching `rfeia` at return both restores
//! them and switches back to the interrupted mode in one instruction.
//! Taking any ARM exception already sets CPSR.I (IRQ masked) as part of
//! entry, so the `cps`-mode switches below never need to manage that bit
//! themselves.

use core::arch::global_asm;

use crate::arch::arm::cpu::set_stk;
use crate::arch::arm::regs::{
    Mode, TRAP_DABT, TRAP_FIQ, TRAP_IABT, TRAP_IRQ, TRAP_NA, TRAP_RESET, TRAP_SWI, TRAP_UND,
};
use crate::layout::VEC_TBL;
use crate::mm::frame_allocator::FRAME_ALLOCATOR;

/// The uniform trap frame every vector builds on the supervisor stack
/// before calling into Rust. Field order follows the natural push order
/// of the assembly stubs below rather than
/// `examples/original_source/src/arm.h`'s declared order; the original's
/// separate `r14_svc`/`pc` fields are unified into one `pc` field here,
/// since the `SRS`-based entry produces exactly one adjusted link-
/// register value per trap (the original's own comment already notes
/// they coincide for `swi`; this design makes that the case for every
/// vector).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    /// User-mode sp, captured via a SYS-mode visit (SYS shares r13/r14
    /// banking with USR).
    pub sp_usr: u32,
    /// User-mode lr.
    pub lr_usr: u32,
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
    pub r12: u32,
    /// The instruction to resume at, after the per-exception link-register
    /// adjustment (spec.md §4.7 step 1) — the same word `rfeia` consumes
    /// as the return PC.
    pub pc: u32,
    /// The interrupted mode's saved program status register — the same
    /// word `rfeia` consumes as the restored CPSR.
    pub spsr: u32,
}

// `TRAP_STUB` is instantiated once per vector with its architected link-
// register adjustment (spec.md §4.7 step 1: 0 for swi/reset, which enter
// SVC mode directly with `lr` already correct; 4 for und/iabt/na/irq/fiq;
// 8 for dabt, since a data abort's `lr` points two instructions past the
// faulting one) and the vector slot `trap_dispatch` uses to pick a
// handler.
#[cfg(target_arch = "arm")]
global_asm!(
    r#"
.macro TRAP_STUB name, adj, vector
.global \name
\name:
    sub lr, lr, #\adj
    srsdb sp!, #0x13
    cps #0x13
    stmfd sp!, {{r0-r12}}
    cps #0x1f
    mov r0, sp
    mov r1, lr
    cps #0x13
    stmfd sp!, {{r0, r1}}

    mov r0, sp
    mov r1, #\vector
    bl trap_dispatch

    ldmfd sp!, {{r0, r1}}
    cps #0x1f
    mov sp, r0
    mov lr, r1
    cps #0x13
    ldmfd sp!, {{r0-r12}}
    rfeia sp!
.endm

TRAP_STUB trap_reset, 0, {trap_reset}
TRAP_STUB trap_und, 4, {trap_und}
TRAP_STUB trap_swi, 0, {trap_swi}
TRAP_STUB trap_iabort, 4, {trap_iabort}
TRAP_STUB trap_dabort, 8, {trap_dabort}
TRAP_STUB trap_na, 4, {trap_na}
TRAP_STUB trap_irq, 4, {trap_irq}
TRAP_STUB trap_fiq, 4, {trap_fiq}
"#,
    trap_reset = const TRAP_RESET,
    trap_und = const TRAP_UND,
    trap_swi = const TRAP_SWI,
    trap_iabort = const TRAP_IABT,
    trap_dabort = const TRAP_DABT,
    trap_na = const TRAP_NA,
    trap_irq = const TRAP_IRQ,
    trap_fiq = const TRAP_FIQ,
);

#[cfg(target_arch = "arm")]
unsafe extern "C" {
    fn trap_reset();
    fn trap_und();
    fn trap_swi();
    fn trap_iabort();
    fn trap_dabort();
    fn trap_na();
    fn trap_irq();
    fn trap_fiq();
}

/// The opcode of `LDR pc, [pc, #24]` — a PC-relative load that reaches
/// the absolute handler address stored 24 bytes past the *vector* slot,
/// i.e. immediately after the eighth vector slot, matching
/// `examples/original_source/src/trap.c`'s `trap_init` (`LDR_PCPC | 0x18`).
#[cfg(target_arch = "arm")]
const LDR_PCPC: u32 = 0xE59F_F000 | 0x18;

/// Install the exception vector table at the architectural high-vectors
/// address (spec.md §4.7). `VEC_TBL` must already be mapped writable by
/// the boot code's identity map.
///
/// # Safety
/// Must run once, before any exception this table would field, and while
/// `VEC_TBL` is mapped into both the currently-active page directory and
/// (eventually) the kernel's high-half directory.
#[cfg(target_arch = "arm")]
pub unsafe fn install_vectors() {
    let table = VEC_TBL as *mut u32;
    let handlers = [
        trap_reset as usize,
        trap_und as usize,
        trap_swi as usize,
        trap_iabort as usize,
        trap_dabort as usize,
        trap_na as usize,
        trap_irq as usize,
        trap_fiq as usize,
    ];
    // SAFETY: `table` is the mapped, writable vector window; each slot
    // and its corresponding handler-address cell (8 words further on)
    // are written exactly once, before any code reads them.
    unsafe {
        for i in 0..8usize {
            core::ptr::write_volatile(table.add(i), LDR_PCPC);
            core::ptr::write_volatile(table.add(8 + i), handlers[i] as u32);
        }
    }
}

/// Host stand-in: there is no high-vectors window to write off real
/// hardware. Kept so `kmain`'s boot sequence compiles identically on
/// both targets.
///
/// # Safety
/// No hardware precondition off `target_arch = "arm"`.
#[cfg(not(target_arch = "arm"))]
pub unsafe fn install_vectors() {}

/// Allocate and install one private stack page for each non-supervisor
/// mode that can take a trap (spec.md §4.7: "used only to hold a tiny
/// prelude before switching to the supervisor stack"). Panics on
/// allocation failure — this runs once during boot, before any process
/// exists, so there is nothing sensible to recover into
/// (`examples/original_source/src/trap.c`'s `trap_init`).
pub fn init_mode_stacks() {
    const MODES: [Mode; 4] = [Mode::Fiq, Mode::Irq, Mode::Abt, Mode::Und];
    for &mode in MODES.iter() {
        let kva = FRAME_ALLOCATOR
            .alloc_page_kva()
            .expect("failed to allocate trap-mode stack page");
        // The stack grows down from the top of the freshly allocated page.
        let top = kva + crate::layout::PAGE_SIZE;
        // SAFETY: boot-time only, interrupts not yet enabled, `top` is a
        // freshly owned page no other mode's stack aliases.
        unsafe { set_stk(mode, top) };
    }
}

/// Entry point called from every vector stub with a pointer to the
/// freshly constructed trap frame and the vector slot that fired.
/// Dispatch and handler policy live in `crate::irq` (spec.md §4.7's
/// "swi, irq, und, iabt, dabt, reset, fiq, na" handler set).
#[no_mangle]
pub extern "C" fn trap_dispatch(frame: *mut TrapFrame, vector: u32) {
    // SAFETY: `frame` was just constructed by the calling stub and is
    // exclusively reachable until this function returns.
    let frame = unsafe { &mut *frame };
    crate::irq::dispatch(vector, frame);
}
