//! Drives a [`DownloadSession`] with the iPXE download protocol.
//!
//! The session itself is handed to iPXE as the callbacks' context, so no global state
//! is involved. It lives on the stack of [`download`] and is only reached through a raw
//! pointer until the transfer is over.

use crate::{
    console,
    error::BootError,
    mem::FirmwarePages,
    protocols::{
        self,
        ipxe::{FileToken, IpxeDownload},
    },
};
use core::ffi::c_void;
use log::{debug, error, info, trace};
use memdisk_core::{
    download::{DownloadSession, Event, MemoryRegion, Progress, RegionAllocator, State},
    options::BootOptions,
};
use uefi::{
    Status,
    boot::{self, EventType, TimerTrigger, Tpl},
};

/// Timer ticks are 100 ns long.
const TICKS_PER_SEC: u64 = 10_000_000;

struct Transfer<A: RegionAllocator> {
    session: DownloadSession<A>,
    /// Set by the finish callback.
    finished: bool,
}

/// Transfer driven by the firmware callbacks.
type FirmwareTransfer = Transfer<FirmwarePages>;

/// The part of the transport the poll loop drives.
trait Transport {
    /// Aborts a transfer, which calls its finish callback with `status`.
    ///
    /// ## Safety
    ///
    /// `file` must be a live transfer.
    unsafe fn abort(&mut self, file: FileToken, status: Status) -> Status;

    fn poll(&mut self) -> Status;
}

impl Transport for IpxeDownload {
    unsafe fn abort(&mut self, file: FileToken, status: Status) -> Status {
        // Safety: forwarded to the caller.
        unsafe { Self::abort(self, file, status) }
    }

    fn poll(&mut self) -> Status {
        Self::poll(self)
    }
}

/// Downloads the image named by the options into a fresh memory region.
pub fn download(options: &BootOptions) -> Result<MemoryRegion, BootError> {
    let mut ipxe =
        protocols::open::<IpxeDownload>().map_err(BootError::missing_protocol("iPXE Download"))?;

    let deadline = options.timeout_secs().map(Deadline::arm).transpose()?;

    let mut transfer = Transfer {
        session: DownloadSession::new(FirmwarePages, options.memory_class()),
        finished: false,
    };
    let context: *mut FirmwareTransfer = &raw mut transfer;

    // Safety:
    // `transfer` outlives the transfer: the loop below only returns once iPXE called
    // the finish callback, or after the transfer was aborted.
    let file = unsafe {
        ipxe.start(
            options.locator().as_c_str(),
            on_data,
            on_finish,
            context.cast(),
        )
    }
    .map_err(BootError::TransportStart)?;

    crate::print!("Downloading ");
    let abort_status = poll_until_finished(&mut *ipxe, file, context, || {
        deadline.as_ref().is_some_and(Deadline::expired)
    });
    if abort_status.is_error() {
        error!("Couldn't abort the transfer ({:?})", abort_status);
    }

    let region = transfer.session.into_region();
    match &region {
        Ok(_) => crate::println!(" success"),
        Err(_) => crate::println!(" failed"),
    }
    let region = region?;

    info!(
        "Downloaded {} bytes to {:#x}",
        region.content_len(),
        region.base()
    );

    Ok(region)
}

/// Polls the transport until the transfer finishes, or aborts it.
///
/// Returns the status of the abort, or `SUCCESS` when the transfer finished on its own.
fn poll_until_finished<T: Transport, A: RegionAllocator>(
    transport: &mut T,
    file: FileToken,
    context: *mut Transfer<A>,
    expired: impl Fn() -> bool,
) -> Status {
    loop {
        // Safety: callbacks only run during `start` and `poll`, never concurrently with this.
        let transfer = unsafe { &mut *context };
        if transfer.finished {
            return Status::SUCCESS;
        }

        let status = if expired() {
            transfer.session.abort(Status::TIMEOUT);
            Some(Status::TIMEOUT)
        } else if let State::Failed(error) = transfer.session.state() {
            // The session refused some data, yet the transport kept going.
            Some(error.status())
        } else {
            None
        };

        if let Some(status) = status {
            debug!("Aborting the transfer ({:?})", status);
            // Safety: the transfer is not finished, so `file` is still live.
            return unsafe { transport.abort(file, status) };
        }

        let poll_status = transport.poll();
        if poll_status.is_error() {
            trace!("Poll failed ({:?})", poll_status);
        }
    }
}

/// Data callback of the transfer.
///
/// ## Safety
///
/// `context` must be the `FirmwareTransfer` registered with the transfer.
/// `buffer` must be valid for `length` bytes.
unsafe extern "efiapi" fn on_data(
    context: *mut c_void,
    buffer: *const c_void,
    length: usize,
    offset: usize,
) -> Status {
    // Safety: see the function's contract.
    let transfer = unsafe { &mut *context.cast::<FirmwareTransfer>() };
    let bytes: &[u8] = if length == 0 || buffer.is_null() {
        &[]
    } else {
        // Safety: see the function's contract.
        unsafe { core::slice::from_raw_parts(buffer.cast::<u8>(), length) }
    };

    let event = transfer.session.classify(offset, bytes);
    match transfer.session.handle(event) {
        Ok(Progress::Tick) => {
            console::progress_tick();
            Status::SUCCESS
        }
        Ok(Progress::Silent) => Status::SUCCESS,
        Err(error) => error.status(),
    }
}

/// Finish callback of the transfer.
///
/// ## Safety
///
/// `context` must be the `FirmwareTransfer` registered with the transfer.
unsafe extern "efiapi" fn on_finish(context: *mut c_void, status: Status) {
    // Safety: see the function's contract.
    let transfer = unsafe { &mut *context.cast::<FirmwareTransfer>() };
    transfer.finished = true;
    // A failure is kept in the session state.
    let _ = transfer.session.handle(Event::Finish { status });
}

/// One-shot firmware timer bounding the download.
struct Deadline {
    event: uefi::Event,
}

impl Deadline {
    fn arm(secs: u32) -> uefi::Result<Self> {
        // Safety: no notification function is involved.
        let event = unsafe { boot::create_event(EventType::TIMER, Tpl::APPLICATION, None, None) }?;
        let deadline = Self { event };
        boot::set_timer(
            &deadline.event,
            TimerTrigger::Relative(u64::from(secs) * TICKS_PER_SEC),
        )?;
        debug!("Download timeout armed for {} seconds", secs);
        Ok(deadline)
    }

    fn expired(&self) -> bool {
        // Safety: the clone is consumed by `check_event`, which does not close it.
        boot::check_event(unsafe { self.event.unsafe_clone() }).unwrap_or(false)
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        // Safety: the event is not used after this point.
        let _ = boot::close_event(unsafe { self.event.unsafe_clone() });
    }
}
