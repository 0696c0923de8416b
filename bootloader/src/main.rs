#![no_main]
#![no_std]
#![warn(clippy::pedantic, clippy::nursery)]

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64",
    target_arch = "x86"
)))]
compile_error!("memdisk has no removable media loader path for this architecture");

use log::{error, info, warn};
use memdisk::{acpi, disk::RegisteredDisk, download, error::BootError, launch, system};
use uefi::prelude::*;

#[panic_handler]
/// Handles panics by logging an error message and attempting
/// to either gracefully reset the system or hang if necessary.
fn panic(panic_info: &core::panic::PanicInfo) -> ! {
    error!("[PANIC]: {}", panic_info.message());

    // If in debug mode, delay to allow the user to read the message
    #[cfg(debug_assertions)]
    {
        if let Some(location) = panic_info.location() {
            error!(
                "Panic occured in file '{}' at line {}",
                location.file(),
                location.line()
            );
        }

        // memdisk never exits boot services
        boot::stall(5_000_000);
    }

    // Check if runtime services are available (they sould be)
    let runtime_services_available = uefi::table::system_table_raw()
        .is_some_and(|system_table| !unsafe { system_table.as_ref() }.runtime_services.is_null());

    // If possible, gracefully reset.
    // Otherwise, hang the system.
    if runtime_services_available {
        uefi::runtime::reset(uefi::runtime::ResetType::COLD, Status::ABORTED, None);
    } else {
        loop {
            halt();
        }
    }
}

#[inline]
fn halt() {
    #[cfg(target_arch = "x86_64")]
    x86_64::instructions::hlt();
    #[cfg(not(target_arch = "x86_64"))]
    core::hint::spin_loop();
}

#[entry]
fn efi_entry() -> Status {
    memdisk::logging::init();

    match run() {
        Ok(status) => status,
        Err(error) => {
            error!("{}", error);
            error.status()
        }
    }
}

fn run() -> Result<Status, BootError> {
    // Print basic firmware information and check for compatibility
    system::check_firmware();

    let options = system::load_options()?;
    info!("Image: {}", options.locator());

    // Large images take longer than the default five minutes
    system::disable_watchdog();

    let region = download::download(&options)?;

    let disk = RegisteredDisk::register(region, options.disk_kind())?;

    if let Err(error) = acpi::advertise(&disk, options.advertise()) {
        warn!("{}, the operating system may not see the ram disk", error);
    }

    let status = launch::boot_from(&disk, options.pause())?;
    if status == Status::NOT_FOUND {
        error!("No loader found on the ram disk");
        disk.unregister();
    }

    Ok(status)
}
