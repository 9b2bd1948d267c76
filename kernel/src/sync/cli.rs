//! Nestable interrupt-disable discipline (spec.md §4.2).
//!
//! `pushcli`/`popcli` pair with every spin-lock acquire/release so that a
//! lock taken from inside an already-`pushcli`'d region doesn't
//! re-enable interrupts when released. The single source of truth for
//! "interrupts enabled" is the CPSR's I-bit, read fresh on every call —
//! this crate never maintains a software mirror of it.

use crate::arch::arm::cpu::{cli, int_enabled, sti};
use crate::sync::percpu::cpu;

/// Disable interrupts, remembering the pre-disable state the first time
/// this nests (spec.md §4.2).
pub fn pushcli() {
    let enabled = int_enabled();
    cli();

    // SAFETY: interrupts are now off (just disabled above), so no other
    // context on this CPU can be racing us for the per-CPU record.
    let c = unsafe { cpu() };
    if c.ncli == 0 {
        c.intena = enabled;
    }
    c.ncli += 1;
}

/// Undo one `pushcli`. Panics (an assertion failure, escalated by the
/// caller to `panic!`) if interrupts are enabled on entry — a sign some
/// handler forgot to match a `pushcli` — or if the nesting count would go
/// negative.
pub fn popcli() {
    assert!(
        !int_enabled(),
        "popcli called with interrupts already enabled"
    );

    // SAFETY: interrupts are confirmed disabled above.
    let c = unsafe { cpu() };
    assert!(c.ncli > 0, "popcli: ncli underflow");
    c.ncli -= 1;

    if c.ncli == 0 && c.intena {
        sti();
    }
}
