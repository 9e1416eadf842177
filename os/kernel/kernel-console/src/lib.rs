//! # Kernel console and logging
//!
//! Routes the `log` crate's macros to the QEMU `virt` machine's 16550 UART,
//! so `log::info!` and friends work from the first instruction after boot
//! without any allocation.
//!
//! ```text
//! log::warn!(..)
//!     ↓
//! ConsoleLogger (level filter, "[LEVEL] target: message")
//!     ↓
//! sink: fn(fmt::Arguments)      ← console_fmt::console_write by default
//!     ↓
//! UART0 transmit holding register (0x1000_0000)
//! ```
//!
//! The sink is a plain function pointer so tests (or a later interrupt-driven
//! console driver) can capture output instead.
//!
//! ## Setup
//!
//! ```rust,no_run
//! use kernel_console::ConsoleLogger;
//! use log::LevelFilter;
//!
//! static LOGGER: ConsoleLogger = ConsoleLogger::new(LevelFilter::Info);
//!
//! LOGGER.init().expect("logger installed once");
//! log::info!("kalloc ready");
//! ```
//!
//! ## Features
//!
//! `enabled` (default) compiles in the UART writes. Without it, or on any
//! target other than `riscv64`, [`console_print!`] output is discarded.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::ConsoleLogger;

#[cfg(all(feature = "enabled", target_arch = "riscv64"))]
#[doc(hidden)]
pub mod console_fmt {
    use core::fmt::{self, Write};

    /// QEMU `virt` UART0 base.
    const UART0: usize = 0x1000_0000;
    /// Line status register offset.
    const LSR: usize = 5;
    /// LSR bit: transmit holding register empty.
    const LSR_TX_IDLE: u8 = 1 << 5;

    /// Write one byte, spinning until the transmitter can take it.
    #[inline]
    pub fn putc(c: u8) {
        let base = core::ptr::with_exposed_provenance_mut::<u8>(UART0);
        unsafe {
            while base.add(LSR).read_volatile() & LSR_TX_IDLE == 0 {
                core::hint::spin_loop();
            }
            base.write_volatile(c);
        }
    }

    pub struct UartSink;

    impl Write for UartSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                putc(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn console_write(args: fmt::Arguments) {
        // Best effort; there is nowhere to report a console failure.
        let _ = fmt::write(&mut UartSink, args);
    }
}

#[cfg(not(all(feature = "enabled", target_arch = "riscv64")))]
#[doc(hidden)]
pub mod console_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn console_write(_: fmt::Arguments) {}
}

/// Print straight to the console, bypassing the logger.
#[macro_export]
macro_rules! console_print {
    ($($arg:tt)*) => {{
        $crate::console_fmt::console_write(core::format_args!($($arg)*));
    }};
}
