//! Per-CPU record.
//!
//! spec.md §3: "a small structure with: an identity, a pointer to the
//! scheduler context, a nesting-depth counter `ncli`, a saved previous
//! interrupt-enable flag `intena`, and a pointer to the currently running
//! process." This is a single-CPU build (spec.md §1 Non-goals: SMP), so
//! there is exactly one static instance; the `smp_stub` feature shapes the
//! type as an array indexable by CPU id without adding bring-up logic, so a
//! later SMP port doesn't have to touch every call site that reads `cpu()`.

use crate::arch::arm::context::Context;
use crate::process::Process;

pub struct Cpu {
    pub id: u8,
    /// `swtch()` saves the scheduler's own context here before resuming a
    /// process, and restores from it when a process yields back.
    pub scheduler: *mut Context,
    /// Depth of `pushcli` nesting. Invariant: interrupts are disabled for
    /// the entire span during which `ncli > 0`.
    pub ncli: i32,
    /// Interrupt-enable state captured by the outermost `pushcli`.
    pub intena: bool,
    /// The process currently running on this CPU, or null.
    pub proc: *mut Process,
}

impl Cpu {
    const fn new(id: u8) -> Self {
        Self {
            id,
            scheduler: core::ptr::null_mut(),
            ncli: 0,
            intena: false,
            proc: core::ptr::null_mut(),
        }
    }
}

#[cfg(feature = "smp_stub")]
const MAX_CPUS: usize = 4;
#[cfg(not(feature = "smp_stub"))]
const MAX_CPUS: usize = 1;

struct CpuTable([Cpu; MAX_CPUS]);
// SAFETY: every entry is read/written only by its own owning CPU (trivially
// true for `MAX_CPUS == 1`); the `smp_stub` shape is reserved for a future
// port and is never indexed by more than one execution context today.
unsafe impl Sync for CpuTable {}

static CPUS: CpuTable = CpuTable([const { Cpu::new(0) }; MAX_CPUS]);

/// The current CPU's per-CPU record.
///
/// # Safety
/// Returns a `&'static mut` to static storage; callers must not hold two
/// references to the same CPU's record concurrently. In this single-CPU
/// build that means: don't call `cpu()` twice and keep both results live
/// across a point where an interrupt handler would also call `cpu()`.
#[allow(invalid_reference_casting)]
pub unsafe fn cpu() -> &'static mut Cpu {
    let ptr = &CPUS.0[current_cpu_id()] as *const Cpu as *mut Cpu;
    // SAFETY: caller upholds this function's documented precondition
    // that no two live references to the same CPU's record overlap.
    unsafe { &mut *ptr }
}

#[cfg(not(feature = "smp_stub"))]
fn current_cpu_id() -> usize {
    0
}

#[cfg(feature = "smp_stub")]
fn current_cpu_id() -> usize {
    // A real SMP port would read a CPU-identity coprocessor register
    // (MPIDR) here; single-CPU callers of this build always get CPU 0.
    0
}
