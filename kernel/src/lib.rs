//! xv6-arm-rs: the privilege/memory/trap core of a teaching-quality
//! ARMv6/v7-A kernel (spec.md §2 System Overview).
//!
//! This crate covers the pieces spec.md scopes in: CPU primitives and
//! the nestable interrupt-disable discipline, early MMU boot, the
//! buddy frame allocator and page-table slab allocator, the two-level
//! virtual memory layer, and ARM exception entry/dispatch. Process
//! creation, the scheduler, syscalls, drivers and the filesystem are
//! external collaborators this crate only takes a reference or a
//! control-block shape from (see `process`).
//!
//! This library target exists so `mm`, `sync`, and `irq` — the
//! architecture-independent algorithms — compile and unit-test on a
//! host target (`cfg(not(target_os = "none"))`) in addition to the
//! real `armv7a-none-eabi` one: every ARM-specific primitive they
//! build on lives behind `arch::arm`'s `target_arch = "arm"` split, so
//! the algorithms above it never need their own `cfg`. The bootable
//! image itself is the `kernel` binary (`main.rs`), which compiles the
//! same module tree directly rather than linking this rlib, so the
//! linker never has to guess which of this crate's object code to
//! retain for a hand-written linker script.

#![cfg_attr(target_os = "none", no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(not(target_os = "none"))]
extern crate std;

pub mod arch;
#[cfg(target_arch = "arm")]
mod boot_sequence;
pub mod console;
pub mod error;
pub mod glue;
pub mod irq;
pub mod klog;
pub mod layout;
pub mod mm;
pub mod process;
pub mod sync;

// `arch::arm::boot`'s `rust_high_entry` resolves `crate::kmain` against
// this re-export; unused (dead) when this crate is built for a host
// test target, since `arch::arm::boot` itself is `target_arch = "arm"`
// only.
#[cfg(target_arch = "arm")]
#[allow(unused_imports)]
use boot_sequence::kmain;
