//! Trap/interrupt dispatch policy (spec.md §4.7 "Handler policy").
//!
//! `arch::arm::trap::trap_dispatch` calls [`dispatch`] with a pointer to
//! the freshly built trap frame and the vector slot that fired; this
//! module owns everything downstream of that: the per-vector handler
//! policy (`trap`) and the interrupt-controller driver the `irq` vector
//! delegates to (`pic`).

pub mod pic;
pub mod trap;

use crate::arch::arm::regs::{
    TRAP_DABT, TRAP_FIQ, TRAP_IABT, TRAP_IRQ, TRAP_NA, TRAP_RESET, TRAP_SWI, TRAP_UND,
};
use crate::arch::arm::trap::TrapFrame;
use trap::FaultKind;

/// Route a trap to its handler by vector slot (spec.md §4.7: "a C-level
/// handler selected by vector").
pub fn dispatch(vector: u32, frame: &mut TrapFrame) {
    match vector {
        TRAP_SWI => trap::handle_swi(frame),
        TRAP_IRQ => trap::handle_irq(frame),
        TRAP_RESET => trap::handle_abort(FaultKind::Reset, frame),
        TRAP_UND => trap::handle_abort(FaultKind::Undefined, frame),
        TRAP_IABT => trap::handle_abort(FaultKind::PrefetchAbort, frame),
        TRAP_DABT => trap::handle_abort(FaultKind::DataAbort, frame),
        TRAP_NA => trap::handle_abort(FaultKind::NotAssigned, frame),
        TRAP_FIQ => trap::handle_abort(FaultKind::Fiq, frame),
        _ => unreachable!("trap vector {vector} out of the eight-entry range"),
    }
}
