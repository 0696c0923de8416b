//! ACPI Table and ACPI SDT protocols.

use core::ffi::c_void;
use uefi::{Status, proto::unsafe_protocol};

/// Key identifying an installed table.
pub type TableKey = usize;

#[repr(C)]
#[unsafe_protocol("ffe06bdd-6107-46a6-7bb2-5a9c7ec5275c")]
pub struct AcpiTable {
    install: unsafe extern "efiapi" fn(
        this: *const Self,
        table: *const c_void,
        size: usize,
        key: *mut TableKey,
    ) -> Status,
    _uninstall: unsafe extern "efiapi" fn(this: *const Self, key: TableKey) -> Status,
}

impl AcpiTable {
    /// Installs a copy of `table`, checksum included, into the platform's tables.
    pub fn install(&self, table: &[u8]) -> Result<TableKey, Status> {
        let mut key = 0;
        // Safety: the firmware only reads `table.len()` bytes, and copies them.
        let status =
            unsafe { (self.install)(self, table.as_ptr().cast(), table.len(), &raw mut key) };
        if status.is_error() {
            Err(status)
        } else {
            Ok(key)
        }
    }
}

/// ACPI SDT protocol.
///
/// Only its presence matters: firmware providing it also publishes the NFIT of the
/// RAM disks it registers.
#[repr(C)]
#[unsafe_protocol("eb97088e-cfdf-49c6-be4b-d906a5b20e86")]
pub struct AcpiSdt {
    _opaque: [u8; 0],
}
