//! Process control block — referenced only.
//!
//! Process scheduling policy, `fork`/`exec`, and the syscall dispatch table
//! are out of scope (spec.md §1 Non-goals); this struct exists only so the
//! trap and virtual-memory layers have something concrete to point at. Its
//! fields are exactly the ones spec.md §3 calls out as the core's "only
//! access points": the page-directory pointer and the trap-frame pointer.

use crate::arch::arm::context::Context;
use crate::arch::arm::trap::TrapFrame;
use crate::mm::page_table::PageDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

/// A process control block.
///
/// `pgdir`/`trapframe`/`context` are raw pointers rather than references
/// because their lifetime is "as long as the process exists", which the
/// borrow checker cannot express across a context switch; every access
/// outside process creation/teardown goes through the `mm::vmm` and
/// `arch::arm::context` APIs, which treat null as "not yet set up".
pub struct Process {
    /// Size of the process's mapped memory, in bytes (`[0, sz)` is valid).
    pub sz: usize,
    /// The process's user page directory (TTBR0 root), or null before
    /// creation has allocated one.
    pub pgdir: *mut PageDirectory,
    /// Bottom of this process's kernel stack.
    pub kstack: usize,
    pub state: ProcessState,
    pub pid: u32,
    /// Parent's pid, or 0 for the first process.
    pub parent_pid: u32,
    /// The trap frame for the syscall/interrupt currently being served on
    /// behalf of this process, if any.
    pub trapframe: *mut TrapFrame,
    /// Saved callee-saved context for `context_switch` (see
    /// `arch::arm::context`).
    pub context: *mut Context,
    /// Non-null when sleeping on a wait channel.
    pub chan: usize,
    /// Set by `kill`; checked at the next syscall or trap-return boundary.
    pub killed: bool,
}

impl Process {
    pub const fn empty() -> Self {
        Self {
            sz: 0,
            pgdir: core::ptr::null_mut(),
            kstack: 0,
            state: ProcessState::Unused,
            pid: 0,
            parent_pid: 0,
            trapframe: core::ptr::null_mut(),
            context: core::ptr::null_mut(),
            chan: 0,
            killed: false,
        }
    }
}

// SAFETY: `Process` is only ever accessed while holding the scheduler's own
// lock (not modeled in this core) or from the single CPU that currently owns
// it; the raw pointers inside are never dereferenced concurrently by this
// crate's code. Marking it Send/Sync lets a `&'static mut Process` live in
// the per-CPU record without threading a lifetime through every trap
// handler signature.
unsafe impl Send for Process {}
unsafe impl Sync for Process {}
