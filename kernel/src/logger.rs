//! Kernel logger.
//!
//! Backs the `log` facade with the serial console. Records are written as
//! `[LEVEL] target: message`, one per line.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::DEFAULT_LOG_LEVEL;
use crate::serial_println;

/// Logger writing every enabled record to the serial console.
pub struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            serial_println!(
                "[{:<5}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

/// Bring up the serial console and install the kernel logger with the
/// given maximum level.
///
/// Fails if a logger has already been installed; the console and the
/// level are set up either way.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    crate::serial::init();
    log::set_max_level(level);
    log::set_logger(&LOGGER)
}

/// Install the kernel logger at [`DEFAULT_LOG_LEVEL`].
pub fn init_default() {
    if init(DEFAULT_LOG_LEVEL).is_err() {
        log::warn!("[LOG] logger already installed");
    }
}
