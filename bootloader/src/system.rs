use crate::error::BootError;
use log::{debug, info, warn};
use memdisk_core::options::{self, BootOptions};
use uefi::{boot, proto::loaded_image::LoadedImage, system};

/// Watchdog code used by memdisk. Codes up to `0xFFFF` are reserved for the firmware.
const WATCHDOG_CODE: u64 = 0x1_0000;

/// Watchdog timeout given to a loader, as boot managers do.
const LOADER_WATCHDOG_SECS: usize = 5 * 60;

/// Size of the buffer receiving the UTF-8 load options.
const LOAD_OPTIONS_CAPACITY: usize = 1024;

/// Print firmware information and check for compatibility.
pub fn check_firmware() {
    info!("Firmware Vendor: {}", system::firmware_vendor());
    info!("Firmware Revision: {}", system::firmware_revision());

    let rev = system::uefi_revision();

    info!("UEFI specification: v{}.{}", rev.major(), rev.minor() / 10);

    if rev.major() != 2 {
        warn!("Running on an unsupported version of UEFI");
    } else if rev.minor() < 30 {
        warn!("Old version of UEFI 2, the RAM Disk protocol might not be available.");
    }
}

/// Disables the watchdog, which would otherwise reset the machine during long downloads.
pub fn disable_watchdog() {
    if let Err(error) = boot::set_watchdog_timer(0, WATCHDOG_CODE, None) {
        warn!("Couldn't disable the watchdog timer ({:?})", error.status());
    }
}

/// Rearms the watchdog before handing control to a loader.
pub fn arm_loader_watchdog() {
    if let Err(error) = boot::set_watchdog_timer(LOADER_WATCHDOG_SECS, WATCHDOG_CODE, None) {
        warn!("Couldn't arm the watchdog timer ({:?})", error.status());
    }
}

/// Reads and parses the load options of the running image.
pub fn load_options() -> Result<BootOptions, BootError> {
    let loaded_image = boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle())
        .map_err(BootError::missing_protocol("Loaded Image"))?;
    let raw = loaded_image
        .load_options_as_cstr16()
        .map_err(BootError::LoadOptions)?;

    let mut buffer = [0_u8; LOAD_OPTIONS_CAPACITY];
    let text = options::transcode_ucs2(raw.iter().map(|&c| u16::from(c)), &mut buffer)?;
    debug!("Load options: {}", text);

    Ok(BootOptions::from_load_options(text)?)
}
