//! ARMv6/v7-A machine support: CPU/mode primitives, the MMU/CP15
//! interface, trap entry, boot, and context switch (spec.md §2, §4).
//!
//! `boot` is the MMU-off entry sequence — it only makes sense linked
//! into the real bare-metal image, so it is excluded from the host
//! build the rest of this crate's unit tests run under (see
//! SPEC_FULL.md §0's "Test tooling"). Every other submodule here
//! compiles on both targets: on `target_arch = "arm"` each primitive is
//! the real CP15/CPSR instruction; on a host target it is a harmless
//! stand-in (most either no-op or back a small software-mirrored flag)
//! so that `mm`, `sync`, and `irq` — the architecture-independent
//! algorithms — compile and unit-test without a cross toolchain.
#[cfg(target_arch = "arm")]
pub mod boot;
pub mod context;
pub mod cpu;
pub mod mmu;
pub mod regs;
pub mod trap;
