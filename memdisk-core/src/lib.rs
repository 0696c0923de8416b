//! Core functionality for memdisk.
//!
//! Everything in here is independent of the firmware: the download state machine,
//! the ACPI table builders, the device path matcher and the load options parser.
//! The UEFI application only provides the collaborators (page allocation, transport,
//! table installation) around them.
#![no_std]
#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::doc_markdown)]

pub mod acpi;
pub mod checksum;
pub mod device_path;
pub mod download;
pub mod guid;
pub mod options;

/// Size of a firmware page, which is the allocation granularity of the download region.
pub const PAGE_SIZE: usize = 4096;

#[macro_export]
macro_rules! static_assert {
    ($condition:expr $(, $($arg:tt)+)?) => {
        const _: () = assert!($condition $(, $($arg)+)?);
    };
}
