//! Kernel error types for the memory and trap core.
//!
//! Trimmed from a much larger capability/IPC/filesystem error taxonomy down
//! to the categories this crate's `mm` and `irq` modules actually raise.
//! Every fallible public operation returns `Result<T, KernelError>` except
//! where spec.md mandates a sentinel return for parity with its testable
//! properties (`allocuvm` -> 0, `copyout`/`uva2ka` -> -1/null); those
//! boundary functions convert a `Result` to the sentinel at the edge.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// The frame or page-table allocator has no free block satisfying the
    /// request.
    OutOfMemory,
    /// A virtual or physical address was malformed (e.g. out of the user
    /// range, or not aligned as the operation requires).
    InvalidAddress { addr: usize },
    /// A walk reached an address with no present mapping.
    UnmappedMemory { addr: usize },
    /// A physical frame number fell outside the range the allocator that
    /// owns it manages.
    InvalidFrame,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::OutOfMemory => write!(f, "out of memory"),
            KernelError::InvalidAddress { addr } => write!(f, "invalid address {addr:#x}"),
            KernelError::UnmappedMemory { addr } => write!(f, "unmapped address {addr:#x}"),
            KernelError::InvalidFrame => write!(f, "invalid physical frame"),
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
