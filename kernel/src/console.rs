//! Minimal UART glue.
//!
//! The console/UART driver proper is an external collaborator (spec.md
//! §1 Non-goals: "the console/UART driver" is out of scope). This module
//! is the thin stand-in needed to make `cprintf`/`println!` and the panic
//! path work: a single PL011-style byte-at-a-time writer, no interrupts,
//! no input handling, no line discipline.

use core::fmt;

use spin::Mutex;

use crate::layout::{p2v, UART0_PA};

struct Uart;

impl Uart {
    #[inline]
    fn dr(&self) -> *mut u32 {
        p2v(UART0_PA) as *mut u32
    }

    fn putc(&mut self, c: u8) {
        // SAFETY: UART0_PA is mapped non-cacheable/non-bufferable by the
        // boot page tables before any console output is attempted.
        unsafe { core::ptr::write_volatile(self.dr(), c as u32) };
    }
}

impl fmt::Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.putc(b'\r');
            }
            self.putc(b);
        }
        Ok(())
    }
}

static CONSOLE: Mutex<Uart> = Mutex::new(Uart);

#[doc(hidden)]
pub fn _cprint(args: fmt::Arguments) {
    use fmt::Write;
    // Locking here is a plain mutex, not pushcli/popcli: cprintf is called
    // from fault handlers with interrupts already disabled, and from
    // ordinary kernel code where a held console lock across a print is
    // an acceptable teaching-kernel simplification (no log buffering).
    let _ = CONSOLE.lock().write_fmt(args);
}

/// Printf-style kernel console output (`cprintf` in the original source).
#[macro_export]
macro_rules! cprintf {
    ($($arg:tt)*) => ($crate::console::_cprint(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::cprintf!("\n"));
    ($($arg:tt)*) => ($crate::cprintf!("{}\n", format_args!($($arg)*)));
}
