//! RAM Disk protocol.

use uefi::{
    Guid, Status,
    proto::{
        device_path::{DevicePath, FfiDevicePath},
        unsafe_protocol,
    },
};

#[repr(C)]
#[unsafe_protocol("ab38a0df-6873-44a9-87e6-d4eb56148449")]
pub struct RamDisk {
    register: unsafe extern "efiapi" fn(
        base: u64,
        size: u64,
        ram_disk_type: *const Guid,
        parent_device_path: *const FfiDevicePath,
        device_path: *mut *const FfiDevicePath,
    ) -> Status,
    unregister: unsafe extern "efiapi" fn(device_path: *const FfiDevicePath) -> Status,
}

impl RamDisk {
    /// Exposes the memory range `base..base + size` as a block device.
    ///
    /// Returns the device path of the new device, owned by the firmware.
    ///
    /// ## Safety
    ///
    /// The range must stay allocated, and untouched by memdisk, for as long as the
    /// device is registered.
    pub unsafe fn register(
        &self,
        base: u64,
        size: u64,
        ram_disk_type: &Guid,
    ) -> Result<&'static DevicePath, Status> {
        let mut device_path = core::ptr::null();
        // Safety: the caller guarantees the range stays valid.
        let status = unsafe {
            (self.register)(
                base,
                size,
                ram_disk_type,
                core::ptr::null(),
                &raw mut device_path,
            )
        };
        if status.is_error() {
            return Err(status);
        }
        if device_path.is_null() {
            return Err(Status::DEVICE_ERROR);
        }

        // Safety:
        // The firmware returned a valid device path, which it keeps until the disk
        // is unregistered.
        Ok(unsafe { DevicePath::from_ffi_ptr(device_path) })
    }

    /// Removes a RAM disk registered with [`RamDisk::register`].
    pub fn unregister(&self, device_path: &DevicePath) -> Result<(), Status> {
        // Safety: `device_path` is a valid device path.
        let status = unsafe { (self.unregister)(device_path.as_ffi_ptr()) };
        if status.is_error() {
            Err(status)
        } else {
            Ok(())
        }
    }
}
