//! This module contains the global logger instance used by the `log` crate.
//!
//! Records are written to the firmware text console, so the logger is only usable
//! while boot services are active, which memdisk never leaves.

use core::fmt::Write;
use uefi::system;

/// The static API for the logger.
pub static LOGGER_API: ConsoleLogger = ConsoleLogger;

/// A logger printing to the firmware console output.
///
/// The console is owned by the firmware, which serializes accesses on its own.
pub struct ConsoleLogger;

/// Installs the console logger.
///
/// In debug builds, every level is printed along with the record's location.
pub fn init() {
    if log::set_logger(&LOGGER_API).is_err() {
        // Already installed.
        return;
    }
    log::set_max_level(if cfg!(debug_assertions) {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    });
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if cfg!(debug_assertions) {
            true
        } else {
            metadata.level() <= log::Level::Info
        }
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        system::with_stdout(|stdout| {
            // There is nowhere to report a console failure.
            let _ = if cfg!(debug_assertions) {
                writeln!(
                    stdout,
                    "[{:5}] {}:{}: {}",
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            } else {
                writeln!(stdout, "[{:5}] {}", record.level(), record.args())
            };
        });
    }

    fn flush(&self) {}
}
