//! Search for a loader on the RAM disk, and start it.

use crate::{
    console,
    disk::{PathDisplay, RegisteredDisk},
    error::BootError,
    protocols, system,
};
use core::mem::MaybeUninit;
use log::{debug, info, warn};
use memdisk_core::device_path;
use uefi::{
    CStr16, Handle, Status,
    boot::{self, LoadImageSource, SearchType},
    cstr16,
    proto::{
        BootPolicy,
        device_path::{DevicePath, build},
        media::{
            file::{File, FileAttribute, FileMode},
            fs::SimpleFileSystem,
        },
    },
};

#[cfg(target_arch = "x86_64")]
/// Path of the loader on removable media.
pub const LOADER_PATH: &CStr16 = cstr16!("\\EFI\\BOOT\\BOOTX64.EFI");
#[cfg(target_arch = "aarch64")]
/// Path of the loader on removable media.
pub const LOADER_PATH: &CStr16 = cstr16!("\\EFI\\BOOT\\BOOTAA64.EFI");
#[cfg(target_arch = "riscv64")]
/// Path of the loader on removable media.
pub const LOADER_PATH: &CStr16 = cstr16!("\\EFI\\BOOT\\BOOTRISCV64.EFI");
#[cfg(target_arch = "x86")]
/// Path of the loader on removable media.
pub const LOADER_PATH: &CStr16 = cstr16!("\\EFI\\BOOT\\BOOTIA32.EFI");

/// Size of the buffer the loader's device path is built in.
const LOADER_DEVICE_PATH_CAPACITY: usize = 1024;

/// Starts the loader of every volume of the RAM disk, in handle order.
///
/// Volumes without a loader, or whose loader fails, are skipped. Returns the status of
/// the last loader that was tried, which is `NOT_FOUND` if there was none.
pub fn boot_from(disk: &RegisteredDisk, pause: bool) -> Result<Status, BootError> {
    let handles = boot::locate_handle_buffer(SearchType::from_proto::<SimpleFileSystem>())?;
    debug!("{} file system handles", handles.len());

    let prefix = disk.device_path().as_bytes();
    let mut last_status = None;

    for (index, &handle) in handles.iter().enumerate() {
        let device_path = match protocols::open_on::<DevicePath>(handle) {
            Ok(device_path) => device_path,
            Err(error) => {
                debug!("Handle {}: no device path ({:?})", index, error.status());
                continue;
            }
        };

        if !device_path::is_prefix(prefix, device_path.as_bytes()) {
            continue;
        }

        info!("Handle {}: {}", index, PathDisplay(&device_path));

        let status = match start_loader(handle, &device_path, pause) {
            Ok(()) => {
                info!("Loader returned");
                Status::SUCCESS
            }
            Err(error) => {
                warn!("Handle {}: {}", index, error);
                error.status()
            }
        };
        last_status = Some(status);
    }

    Ok(last_status.unwrap_or(Status::NOT_FOUND))
}

fn start_loader(handle: Handle, device_path: &DevicePath, pause: bool) -> Result<(), BootError> {
    // Make sure the loader exists, to report a clearer error than `load_image` would.
    {
        let mut file_system = protocols::open_on::<SimpleFileSystem>(handle)
            .map_err(BootError::missing_protocol("Simple File System"))?;
        let mut root = file_system.open_volume()?;
        root.open(LOADER_PATH, FileMode::Read, FileAttribute::empty())?
            .close();
    }

    let mut buffer = [MaybeUninit::uninit(); LOADER_DEVICE_PATH_CAPACITY];
    let loader_path = loader_device_path(device_path, &mut buffer)?;
    info!("Trying to load {}", PathDisplay(loader_path));

    let image = boot::load_image(
        boot::image_handle(),
        LoadImageSource::FromDevicePath {
            device_path: loader_path,
            boot_policy: BootPolicy::ExactMatch,
        },
    )?;
    debug!("Loader loaded");

    if pause {
        console::wait_for_key();
    }

    system::arm_loader_watchdog();
    let result = boot::start_image(image);
    system::disable_watchdog();

    result.map_err(BootError::from)
}

/// Appends the loader's file path to the device path of a volume.
fn loader_device_path<'a>(
    volume: &DevicePath,
    buffer: &'a mut [MaybeUninit<u8>],
) -> Result<&'a DevicePath, BootError> {
    let mut builder = build::DevicePathBuilder::with_buf(buffer);
    for node in volume.node_iter() {
        builder = builder.push(&node)?;
    }
    builder = builder.push(&build::media::FilePath {
        path_name: LOADER_PATH,
    })?;

    Ok(builder.finalize()?)
}
