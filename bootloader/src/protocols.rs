//! Bindings to the firmware protocols `uefi` does not wrap.

use uefi::{
    Handle,
    boot::{self, OpenProtocolAttributes, OpenProtocolParams, ScopedProtocol},
    proto::ProtocolPointer,
};

pub mod acpi;
pub mod ipxe;
pub mod ram_disk;

/// Opens the first instance of a protocol, without claiming it.
pub fn open<P: ProtocolPointer + ?Sized>() -> uefi::Result<ScopedProtocol<P>> {
    let handle = boot::get_handle_for_protocol::<P>()?;
    open_on::<P>(handle)
}

/// Opens a protocol on `handle`, without claiming it.
///
/// Drivers and other applications may keep using the protocol, just like `HandleProtocol`
/// would allow.
pub fn open_on<P: ProtocolPointer + ?Sized>(handle: Handle) -> uefi::Result<ScopedProtocol<P>> {
    // Safety:
    // memdisk never uninstalls or reinstalls protocols, and only uses them until
    // the returned scope is dropped.
    unsafe {
        boot::open_protocol::<P>(
            OpenProtocolParams {
                handle,
                agent: boot::image_handle(),
                controller: None,
            },
            OpenProtocolAttributes::GetProtocol,
        )
    }
}

#[must_use]
/// Whether some handle provides the protocol.
pub fn is_available<P: ProtocolPointer + ?Sized>() -> bool {
    boot::get_handle_for_protocol::<P>().is_ok()
}
