//! Context switch (spec.md §4.8 — referenced only: the scheduler that
//! would call `context_switch` is out of scope, but the trap/process
//! layer needs a concrete type to point `Process::context` at).
//!
//! Grounded in `examples/original_source/src/swtch.S`'s register set:
//! only the callee-saved registers need saving across a switch, since
//! `context_switch` is always reached through an ordinary `bl` (the
//! caller-saved registers are already on the stack or dead by the ARM
//! EABI's own calling convention).

use core::arch::global_asm;

/// Callee-saved registers preserved across a context switch, plus the
/// link register the switch returns through. Pushed/popped by
/// `context_switch` in `r4`-ascending order; never constructed field by
/// field from Rust, only ever pointed to.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
    pub lr: u32,
}

#[cfg(target_arch = "arm")]
global_asm!(
    r#"
.global context_switch
context_switch:
    push {{r4-r11, lr}}
    str sp, [r0]
    mov sp, r1
    pop {{r4-r11, lr}}
    bx lr
"#
);

#[cfg(target_arch = "arm")]
unsafe extern "C" {
    /// Save the caller's callee-saved registers onto the current stack,
    /// record the resulting `sp` at `*old`, switch to `new` (the `sp` a
    /// previous `context_switch` call saved for the target context), and
    /// resume there.
    ///
    /// # Safety
    /// `old` must point to a location that can hold a context pointer for
    /// as long as the switched-away-from thread is suspended; `new` must
    /// be a stack pointer a previous `context_switch` (or initial process
    /// setup mimicking one) left pointing at a valid `Context`.
    pub fn context_switch(old: *mut *mut Context, new: *mut Context);
}

/// Host stand-in: the scheduler that would call this is out of scope
/// (spec.md §4.8 is "referenced only"), so no host test ever actually
/// switches stacks. Kept so `process::pcb` compiles off `target_arch =
/// "arm"` without its own cfg-gating.
///
/// # Safety
/// Never actually switches control off `target_arch = "arm"`; matches
/// the real signature so callers compile unchanged.
#[cfg(not(target_arch = "arm"))]
pub unsafe fn context_switch(_old: *mut *mut Context, _new: *mut Context) {}
