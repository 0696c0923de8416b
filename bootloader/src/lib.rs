//! memdisk UEFI application.
//!
//! Downloads a disk image through iPXE, registers it as a RAM disk, advertises it to the
//! operating system through ACPI and starts the loader found on it.
#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc)]

pub mod acpi;
pub mod console;
pub mod disk;
pub mod download;
pub mod error;
pub mod launch;
pub mod logging;
pub mod mem;
pub mod protocols;
pub mod system;
