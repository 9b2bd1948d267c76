//! Architecture-specific code. This crate targets a single machine — a
//! bare ARMv6/v7-A board (spec.md §2) — so there is exactly one
//! submodule, unconditionally present rather than `cfg`-gated behind a
//! `target_arch` match.

pub mod arm;
