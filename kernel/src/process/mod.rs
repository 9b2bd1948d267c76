//! Process control block (referenced only).
//!
//! spec.md §1 puts process creation, scheduling policy and the syscall
//! dispatch table out of scope; this module only exposes the PCB shape
//! those collaborators share with the trap/VM core, plus the "current
//! process" slot the trap entry and `mm::vmm` read.

pub mod pcb;

pub use pcb::{Process, ProcessState};

use crate::sync::percpu::cpu;

/// The process currently running on this CPU, or `None` while the kernel
/// is idling in the scheduler loop (spec.md §4.7: "If there is a current
/// process, stash its trap frame").
///
/// # Safety
/// Valid only with interrupts disabled or while holding whatever lock the
/// (unimplemented) scheduler uses to protect process state; this core never
/// mutates it concurrently with itself.
pub unsafe fn current() -> Option<&'static mut Process> {
    // SAFETY: caller upholds this function's documented precondition.
    unsafe { cpu().proc.as_mut() }
}
