//! Serial console output.
//!
//! On bare metal with the `serial-console` feature this drives the COM1
//! 16550 UART. Hosted builds have no UART; a sink function can be
//! registered instead with [`set_host_sink`], otherwise output is dropped.

use core::fmt;
use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

#[cfg(all(target_arch = "x86_64", target_os = "none", feature = "serial-console"))]
mod port {
    use spin::Mutex;
    use uart_16550::SerialPort;

    /// COM1 base address.
    const COM1_BASE: u16 = 0x3F8;

    /// Global serial port (COM1).
    static SERIAL1: Mutex<Option<SerialPort>> = Mutex::new(None);

    pub fn init() {
        // SAFETY: COM1 is a standard port on PC-compatible machines and
        // nothing else in the kernel drives it.
        let mut port = unsafe { SerialPort::new(COM1_BASE) };
        port.init();
        *SERIAL1.lock() = Some(port);
    }

    pub fn write_str(s: &str) {
        if let Some(ref mut serial) = *SERIAL1.lock() {
            for byte in s.bytes() {
                serial.send(byte);
            }
        }
    }
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none", feature = "serial-console")))]
mod port {
    pub fn init() {}

    pub fn write_str(_s: &str) {}
}

/// Console sink for hosted builds.
static HOST_SINK: Mutex<Option<fn(&str)>> = Mutex::new(None);

/// Set once the console has been brought up.
static SERIAL_READY: AtomicBool = AtomicBool::new(false);

/// Initialize the serial console. Later calls do nothing.
pub fn init() {
    if SERIAL_READY.swap(true, Ordering::SeqCst) {
        return;
    }
    port::init();
}

/// Whether [`init`] has run.
pub fn is_initialized() -> bool {
    SERIAL_READY.load(Ordering::SeqCst)
}

/// Route console output to `sink`, or stop routing it with `None`.
///
/// The UART, when present, keeps receiving output as well.
pub fn set_host_sink(sink: Option<fn(&str)>) {
    *HOST_SINK.lock() = sink;
}

/// Write a string to the console.
pub fn write_str(s: &str) {
    port::write_str(s);
    let sink = *HOST_SINK.lock();
    if let Some(sink) = sink {
        sink(s);
    }
}

/// Serial writer for formatting.
pub struct SerialWriter;

impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_str(s);
        Ok(())
    }
}

/// Print macro for serial output.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*));
    };
}

/// Println macro for serial output.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => {
        $crate::serial_print!("{}\n", format_args!($($arg)*));
    };
}

/// Internal print function.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    // A timer tick must not switch away while the port lock is held.
    crate::interrupts::without_interrupts(|| {
        let _ = SerialWriter.write_fmt(args);
    });
}
