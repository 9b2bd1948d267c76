//! Synchronization primitives.
//!
//! Mutual exclusion itself is an external collaborator (spec.md §6: "a
//! spin-lock implementation with initlock/acquire/release/holding"),
//! provided here by `spin::Mutex`. What this module owns is the
//! nestable-interrupt-disable discipline those locks are built on top of,
//! and the per-CPU record it's tracked in.

pub mod cli;
pub mod percpu;

pub use cli::{popcli, pushcli};
