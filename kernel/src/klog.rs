//! `log` facade wired to the console.
//!
//! Ordinary kernel code should prefer `log::{info,warn,error,debug}!` over
//! `println!`/`cprintf!`; the latter remain for the panic path and other
//! contexts where the logger might not yet be installed or where an
//! allocation-free, always-available primitive is required.

use log::{LevelFilter, Log, Metadata, Record};

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::println!("[{:>5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

#[cfg(feature = "verbose")]
const fn max_level() -> LevelFilter {
    LevelFilter::Debug
}

#[cfg(not(feature = "verbose"))]
const fn max_level() -> LevelFilter {
    LevelFilter::Info
}

/// Install the kernel logger. Must be called once, early in boot, before
/// any `log::*!` call; `cprintf!`/`println!` do not depend on this.
pub fn init() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(max_level()))
        .ok();
}
