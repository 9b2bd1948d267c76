//! Per-vector handler policy (spec.md §4.7 "Handler policy"), grounded
//! in `examples/original_source/src/trap.c`'s `swi_handler`/
//! `irq_handler`/`*_handler` functions and `dump_trapframe`.

use spin::Mutex;

use crate::arch::arm::cpu::cli;
use crate::arch::arm::mmu::{data_fault_status, fault_address, instr_fault_status};
use crate::arch::arm::regs::Mode;
use crate::arch::arm::trap::TrapFrame;
use crate::process;

/// The abstract boundary to whatever owns the syscall numbering table
/// (spec.md §1 Non-goals: "the syscall dispatch table" is out of
/// scope). `handle_swi` dispatches through this trait instead of a
/// concrete `syscall()`, so this core compiles and is testable on its
/// own.
pub trait SyscallDispatcher: Sync {
    fn dispatch(&self, tf: &mut TrapFrame);
}

struct NullDispatcher;

impl SyscallDispatcher for NullDispatcher {
    fn dispatch(&self, _tf: &mut TrapFrame) {
        log::warn!("swi: no syscall dispatcher installed");
    }
}

static DISPATCHER: Mutex<&'static dyn SyscallDispatcher> = Mutex::new(&NullDispatcher);

/// Install the syscall dispatcher. Called once by whatever collaborator
/// owns the syscall table, before any user process can trap in.
pub fn set_syscall_dispatcher(dispatcher: &'static dyn SyscallDispatcher) {
    *DISPATCHER.lock() = dispatcher;
}

fn current_killed() -> bool {
    // SAFETY: a single-CPU glance at the current process's kill flag;
    // handlers run with interrupts masked until the frame is fully
    // built, so nothing else can be mutating it concurrently.
    unsafe { process::current() }.map_or(false, |p| p.killed)
}

/// spec.md §4.7: "if the current process has been killed, exit
/// immediately; otherwise stash the trap-frame pointer in the process
/// record and dispatch to syscall; re-check kill on return." Actually
/// tearing a process down is scheduler policy (out of scope, see
/// `process::pcb`); this stops short of that and leaves the `killed`
/// flag as the signal the (unimplemented) trap-return boundary would
/// act on.
pub fn handle_swi(frame: &mut TrapFrame) {
    if current_killed() {
        return;
    }
    // SAFETY: see `current_killed`.
    if let Some(p) = unsafe { process::current() } {
        p.trapframe = frame as *mut TrapFrame;
    }
    DISPATCHER.lock().dispatch(frame);
    if current_killed() {
        log::debug!("swi: process killed during syscall, deferring to trap return");
    }
}

/// spec.md §4.7: "if there is a current process, stash its trap frame;
/// then delegate to the interrupt-controller dispatcher."
pub fn handle_irq(frame: &mut TrapFrame) {
    // SAFETY: see `current_killed`.
    if let Some(p) = unsafe { process::current() } {
        p.trapframe = frame as *mut TrapFrame;
    }
    crate::irq::pic::dispatch();
}

/// Which of the non-syscall, non-irq vectors trapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Reset,
    Undefined,
    PrefetchAbort,
    DataAbort,
    NotAssigned,
    Fiq,
}

/// spec.md §4.7's shared handler for "data abort / prefetch abort /
/// undefined / reset / fiq / n-a": disable interrupts, print a
/// diagnostic, dump the trap frame, then apply SPEC_FULL.md §11's
/// resolved abort-recovery policy — process-fatal only if the saved
/// SPSR's mode bits show the fault occurred in USR mode; any fault
/// saved in a privileged mode escalates to `panic`.
pub fn handle_abort(kind: FaultKind, frame: &mut TrapFrame) {
    cli();

    match kind {
        FaultKind::DataAbort => {
            let dfs = data_fault_status();
            let fa = fault_address();
            log::error!(
                "data abort: instruction {:#x}, fault addr {:#x}, reason {:#x}",
                frame.pc,
                fa,
                dfs
            );
        }
        FaultKind::PrefetchAbort => {
            let ifs = instr_fault_status();
            log::error!("prefetch abort at {:#x} (reason {:#x})", frame.pc, ifs);
        }
        FaultKind::Undefined => log::error!("undefined instruction at {:#x}", frame.pc),
        FaultKind::Reset => log::error!("reset at {:#x}", frame.pc),
        FaultKind::NotAssigned => log::error!("n/a trap at {:#x}", frame.pc),
        FaultKind::Fiq => log::error!("fiq at {:#x}", frame.pc),
    }
    dump_trapframe(frame);

    let faulted_in_user = (frame.spsr & Mode::MASK) == Mode::Usr as u32;
    if faulted_in_user {
        log::warn!("{:?}: killing faulting user process", kind);
        // SAFETY: see `current_killed`.
        if let Some(p) = unsafe { process::current() } {
            p.killed = true;
        }
        return;
    }

    panic!("unrecoverable {kind:?} in kernel mode at {:#x}", frame.pc);
}

fn dump_trapframe(tf: &TrapFrame) {
    log::error!("spsr: {:#x}  pc: {:#x}", tf.spsr, tf.pc);
    log::error!("  r0: {:#x}  r1: {:#x}  r2: {:#x}  r3: {:#x}", tf.r0, tf.r1, tf.r2, tf.r3);
    log::error!("  r4: {:#x}  r5: {:#x}  r6: {:#x}  r7: {:#x}", tf.r4, tf.r5, tf.r6, tf.r7);
    log::error!("  r8: {:#x}  r9: {:#x} r10: {:#x} r11: {:#x}", tf.r8, tf.r9, tf.r10, tf.r11);
    log::error!(" r12: {:#x}", tf.r12);
    log::error!("usr sp: {:#x}  usr lr: {:#x}", tf.sp_usr, tf.lr_usr);
}
