//! Raw console output, for what is not a log record.

use core::fmt::Write;
use uefi::{boot, system};

/// Delay between two keyboard polls, in microseconds.
const KEY_POLL_INTERVAL: usize = 10_000;

pub fn print(args: core::fmt::Arguments) {
    system::with_stdout(|stdout| {
        let _ = stdout.write_fmt(args);
    });
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::console::print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

#[inline]
/// Marks another step of the download.
pub fn progress_tick() {
    print(format_args!("."));
}

/// Waits until a key is pressed.
pub fn wait_for_key() {
    crate::println!("Press any key to continue...");

    system::with_stdin(|stdin| {
        // Drop keys pressed during the download.
        let _ = stdin.reset(false);

        loop {
            match stdin.read_key() {
                Ok(Some(_)) => break,
                Ok(None) => boot::stall(KEY_POLL_INTERVAL),
                Err(error) => {
                    log::warn!("Couldn't read the keyboard ({:?}), not waiting", error.status());
                    break;
                }
            }
        }
    });
}
