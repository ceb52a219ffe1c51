use core::fmt::{self, Write};

use crate::arch::console_putchar;

struct Stdout;

impl fmt::Write for Stdout {
    /// Prints a string, which can contain non-ASCII characters.
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // The console takes one byte at a time, so multi-byte characters
        // go out as their UTF-8 encoding.
        for byte in s.bytes() {
            console_putchar(byte);
        }
        Ok(())
    }
}

/// Prints formatted string by [`core::format_args!`].
pub fn _print(args: fmt::Arguments) {
    let _ = Stdout.write_fmt(args);
}

#[macro_export]
macro_rules! print {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::_print(format_args!($fmt $(, $($arg)+)?));
    }
}

#[macro_export]
macro_rules! println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::_print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?));
    }
}
