//! iPXE download protocol.
//!
//! Exposed by iPXE when it chainloads an image, it streams any URI iPXE can fetch.
//! Data and completion are pushed through callbacks, which only run from inside
//! [`IpxeDownload::start`] and [`IpxeDownload::poll`].

use core::ffi::{CStr, c_char, c_void};
use uefi::{Status, proto::unsafe_protocol};

/// Opaque handle of a transfer.
pub type FileToken = *mut c_void;

/// Receives a chunk of the file at `offset`.
///
/// The first call has a zero `length` and reports the file size as its `offset`.
/// Returning an error aborts the transfer.
pub type DataCallback = unsafe extern "efiapi" fn(
    context: *mut c_void,
    buffer: *const c_void,
    length: usize,
    offset: usize,
) -> Status;

/// Called once the transfer is over, whatever the outcome.
pub type FinishCallback = unsafe extern "efiapi" fn(context: *mut c_void, status: Status);

#[repr(C)]
#[unsafe_protocol("3eaeaebd-decf-493b-9bd1-cdb2decae719")]
pub struct IpxeDownload {
    start: unsafe extern "efiapi" fn(
        this: *mut Self,
        url: *const c_char,
        data_callback: DataCallback,
        finish_callback: FinishCallback,
        context: *mut c_void,
        file: *mut FileToken,
    ) -> Status,
    abort: unsafe extern "efiapi" fn(this: *mut Self, file: FileToken, status: Status) -> Status,
    poll: unsafe extern "efiapi" fn(this: *mut Self) -> Status,
}

impl IpxeDownload {
    /// Starts downloading `url`.
    ///
    /// ## Safety
    ///
    /// `context` is handed to the callbacks as is. It must stay valid for them until
    /// `finish_callback` has been called or the transfer has been aborted.
    pub unsafe fn start(
        &mut self,
        url: &CStr,
        data_callback: DataCallback,
        finish_callback: FinishCallback,
        context: *mut c_void,
    ) -> Result<FileToken, Status> {
        let mut file = core::ptr::null_mut();
        // Safety: the caller upholds the context contract, the URL is NUL-terminated.
        let status = unsafe {
            (self.start)(
                self,
                url.as_ptr(),
                data_callback,
                finish_callback,
                context,
                &raw mut file,
            )
        };
        if status.is_error() {
            Err(status)
        } else {
            Ok(file)
        }
    }

    /// Aborts a transfer, which calls its finish callback with `status`.
    ///
    /// ## Safety
    ///
    /// `file` must come from [`IpxeDownload::start`] and the transfer must not be finished.
    pub unsafe fn abort(&mut self, file: FileToken, status: Status) -> Status {
        // Safety: the caller guarantees `file` is a live transfer.
        unsafe { (self.abort)(self, file, status) }
    }

    /// Lets iPXE make progress. Callbacks are invoked from here.
    pub fn poll(&mut self) -> Status {
        // Safety: `self` is a valid protocol instance.
        unsafe { (self.poll)(self) }
    }
}
