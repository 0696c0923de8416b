//! Exposure of the downloaded image as a block device.

use crate::{error::BootError, protocols, protocols::ram_disk::RamDisk};
use log::{info, warn};
use memdisk_core::{download::MemoryRegion, guid::DiskKind};
use uefi::{
    CStr16,
    proto::device_path::{
        DevicePath,
        text::{AllowShortcuts, DevicePathToText, DisplayOnly},
    },
};

/// A downloaded image registered with the firmware as a RAM disk.
pub struct RegisteredDisk {
    region: MemoryRegion,
    kind: DiskKind,
    device_path: &'static DevicePath,
}

impl RegisteredDisk {
    /// Registers the region as a RAM disk of the given kind.
    ///
    /// The firmware's partition and file system drivers connect to the new device on their
    /// own, which makes its volumes show up as file system handles.
    pub fn register(region: MemoryRegion, kind: DiskKind) -> Result<Self, BootError> {
        let ram_disk =
            protocols::open::<RamDisk>().map_err(BootError::missing_protocol("Ram Disk"))?;

        // Safety:
        // The region is never freed nor written to again once downloaded.
        let device_path = unsafe {
            ram_disk.register(region.base(), region.len() as u64, &kind.type_guid())
        }
        .map_err(BootError::Register)?;

        info!("Ram disk registered: {}", PathDisplay(device_path));

        Ok(Self {
            region,
            kind,
            device_path,
        })
    }

    /// Removes the RAM disk.
    ///
    /// The region stays allocated, as the firmware may still reference it.
    pub fn unregister(self) {
        let result = protocols::open::<RamDisk>()
            .map_err(|error| error.status())
            .and_then(|ram_disk| ram_disk.unregister(self.device_path));
        if let Err(status) = result {
            warn!("Couldn't unregister the ram disk ({:?})", status);
        }
    }

    #[must_use]
    #[inline]
    pub const fn region(&self) -> &MemoryRegion {
        &self.region
    }

    #[must_use]
    #[inline]
    pub const fn kind(&self) -> DiskKind {
        self.kind
    }

    #[must_use]
    #[inline]
    pub const fn device_path(&self) -> &'static DevicePath {
        self.device_path
    }
}

/// Displays a device path in its textual form, when the firmware can convert it.
pub struct PathDisplay<'a>(pub &'a DevicePath);

impl core::fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let Ok(to_text) = protocols::open::<DevicePathToText>() else {
            return write_text(f, None);
        };
        let text = to_text
            .convert_device_path_to_text(self.0, DisplayOnly(true), AllowShortcuts(true))
            .ok();
        write_text(f, text.as_deref())
    }
}

fn write_text(f: &mut core::fmt::Formatter<'_>, text: Option<&CStr16>) -> core::fmt::Result {
    match text {
        Some(text) if !text.is_empty() => write!(f, "{text}"),
        _ => f.write_str("<device path>"),
    }
}
