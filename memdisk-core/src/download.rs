//! Streaming download into a fixed memory region.
//!
//! The transport pushes the image through a single data callback. Before any data, it
//! announces the final size with a zero-length "probe" whose offset is the total size.
//! The session allocates the region once on the probe, then copies every chunk at its
//! offset. Chunks may arrive out of order or overlap.

use crate::PAGE_SIZE;
use thiserror::Error;
use uefi_raw::Status;

/// Number of progress ticks emitted over a complete download.
pub const PROGRESS_STEPS: usize = 20;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum DownloadError {
    #[error("Couldn't allocate {pages} pages for download ({status:?})")]
    Allocation { pages: usize, status: Status },
    #[error(
        "Download buffer extends beyond allocated buffer (offset: {offset}, length: {length}, size: {size})"
    )]
    OutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },
    #[error("Transport announced an empty image")]
    Empty,
    #[error("Transport delivered data before announcing the image size")]
    NotSized,
    #[error("Transport failed ({0:?})")]
    Transport(Status),
    #[error("Download aborted ({0:?})")]
    Aborted(Status),
}

impl DownloadError {
    #[must_use]
    /// Status code reported to the firmware for this error.
    pub const fn status(self) -> Status {
        match self {
            Self::Allocation { status, .. } | Self::Transport(status) | Self::Aborted(status) => {
                status
            }
            Self::OutOfBounds { .. } | Self::Empty => Status::BAD_BUFFER_SIZE,
            Self::NotSized => Status::PROTOCOL_ERROR,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Classification of the memory backing the region.
pub enum MemoryClass {
    /// Survives the handoff to the operating system.
    #[default]
    Reserved,
    /// Returned to the operating system once boot services are exited.
    BootServicesData,
}

impl MemoryClass {
    #[must_use]
    #[inline]
    /// Whether the memory is still owned by the region after the firmware handoff.
    pub const fn survives_handoff(self) -> bool {
        matches!(self, Self::Reserved)
    }
}

/// Source of the pages backing a download.
pub trait RegionAllocator {
    /// Allocates `pages` contiguous pages of the given class.
    ///
    /// The returned slice must be exactly `pages * PAGE_SIZE` bytes long.
    /// Its content does not need to be initialized to any particular value.
    fn allocate_pages(
        &mut self,
        pages: usize,
        class: MemoryClass,
    ) -> Result<&'static mut [u8], Status>;

    /// Gives back pages obtained from [`RegionAllocator::allocate_pages`].
    fn free_pages(&mut self, pages: &'static mut [u8]);
}

#[derive(Debug)]
/// A page-granular memory region holding the downloaded image.
pub struct MemoryRegion {
    buffer: &'static mut [u8],
    content_len: usize,
    class: MemoryClass,
}

impl MemoryRegion {
    #[must_use]
    #[inline]
    /// Physical (identity-mapped) start address of the region.
    pub fn base(&self) -> u64 {
        self.buffer.as_ptr() as u64
    }

    #[must_use]
    #[inline]
    /// Length of the region, rounded up to the page size.
    pub const fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    #[inline]
    /// Number of bytes announced by the transport.
    pub const fn content_len(&self) -> usize {
        self.content_len
    }

    #[must_use]
    #[inline]
    pub const fn class(&self) -> MemoryClass {
        self.class
    }

    #[must_use]
    #[inline]
    /// Number of pages spanned by the region.
    pub const fn pages(&self) -> usize {
        self.buffer.len() / PAGE_SIZE
    }

    #[must_use]
    #[inline]
    pub const fn as_bytes(&self) -> &[u8] {
        self.buffer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle of a download session.
pub enum State {
    /// Waiting for the size probe.
    Unsized,
    /// The region is allocated, no data has arrived yet.
    Sized,
    /// At least one data event was applied.
    Receiving,
    /// The transport reported success.
    Complete,
    /// The session was aborted, either by the transport or by this side.
    Failed(DownloadError),
}

impl State {
    #[must_use]
    #[inline]
    /// Whether the session will not accept any more events.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An event delivered by the transport.
pub enum Event<'a> {
    /// Announces the total size of the image.
    Probe { size: usize },
    /// A chunk of the image, to be placed at `offset`.
    Data { offset: usize, bytes: &'a [u8] },
    /// The transport is done, successfully or not.
    Finish { status: Status },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of a successfully applied event.
pub enum Progress {
    /// Another `1 / PROGRESS_STEPS` of the image has been received.
    Tick,
    Silent,
}

/// A single download attempt.
pub struct DownloadSession<A: RegionAllocator> {
    allocator: A,
    class: MemoryClass,
    state: State,
    region: Option<&'static mut [u8]>,
    expected_len: usize,
    received: usize,
    progress_unit: usize,
}

impl<A: RegionAllocator> DownloadSession<A> {
    #[must_use]
    #[inline]
    pub const fn new(allocator: A, class: MemoryClass) -> Self {
        Self {
            allocator,
            class,
            state: State::Unsized,
            region: None,
            expected_len: 0,
            received: 0,
            progress_unit: 0,
        }
    }

    #[must_use]
    #[inline]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    #[inline]
    pub const fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    #[must_use]
    #[inline]
    /// Total size announced by the probe, before rounding.
    pub const fn expected_len(&self) -> usize {
        self.expected_len
    }

    #[must_use]
    #[inline]
    /// Number of bytes delivered so far, overlapping chunks counted every time.
    pub const fn received(&self) -> usize {
        self.received
    }

    #[must_use]
    #[inline]
    /// Maps the raw data callback arguments to an event.
    ///
    /// A zero-length callback is the size probe only as long as the session is unsized.
    /// Afterwards, it is an empty (and harmless) chunk.
    pub fn classify<'a>(&self, offset: usize, bytes: &'a [u8]) -> Event<'a> {
        if bytes.is_empty() && self.state == State::Unsized {
            Event::Probe { size: offset }
        } else {
            Event::Data { offset, bytes }
        }
    }

    /// Applies an event to the session.
    ///
    /// Once the session has failed, events are ignored and the error that ended it is returned.
    /// Events arriving after completion are ignored as well.
    pub fn handle(&mut self, event: Event<'_>) -> Result<Progress, DownloadError> {
        match self.state {
            State::Failed(error) => return Err(error),
            State::Complete => return Ok(Progress::Silent),
            State::Unsized | State::Sized | State::Receiving => {}
        }

        let result = match event {
            Event::Probe { size } => self.on_probe(size),
            Event::Data { offset, bytes } => self.on_data(offset, bytes),
            Event::Finish { status } => self.on_finish(status),
        };

        if let Err(error) = result {
            self.state = State::Failed(error);
        }
        result
    }

    /// Aborts the session from this side of the transport.
    ///
    /// Has no effect on a finished session.
    pub fn abort(&mut self, status: Status) {
        if !self.is_finished() {
            self.state = State::Failed(DownloadError::Aborted(status));
        }
    }

    /// Hands the downloaded region off to the caller.
    ///
    /// Only a complete session yields a region. Otherwise, the error that ended the
    /// session is returned and the pages are released.
    pub fn into_region(mut self) -> Result<MemoryRegion, DownloadError> {
        match self.state {
            State::Complete => {
                let buffer = self.region.take().ok_or(DownloadError::NotSized)?;
                Ok(MemoryRegion {
                    buffer,
                    content_len: self.expected_len,
                    class: self.class,
                })
            }
            State::Failed(error) => Err(error),
            State::Unsized | State::Sized | State::Receiving => {
                Err(DownloadError::Aborted(Status::NOT_READY))
            }
        }
    }

    fn on_probe(&mut self, size: usize) -> Result<Progress, DownloadError> {
        if self.state != State::Unsized {
            // Should not happen as `classify` never produces a late probe.
            return Ok(Progress::Silent);
        }
        if size == 0 {
            return Err(DownloadError::Empty);
        }

        self.expected_len = size;
        self.progress_unit = size / PROGRESS_STEPS;

        let pages = size.div_ceil(PAGE_SIZE);
        let buffer = self
            .allocator
            .allocate_pages(pages, self.class)
            .map_err(|status| DownloadError::Allocation { pages, status })?;
        debug_assert_eq!(buffer.len(), pages * PAGE_SIZE);
        buffer.fill(0);

        log::debug!(
            "Download of {} bytes sized to {} pages at {:#x}",
            size,
            pages,
            buffer.as_ptr() as usize
        );

        self.region = Some(buffer);
        self.state = State::Sized;

        Ok(Progress::Silent)
    }

    fn on_data(&mut self, offset: usize, bytes: &[u8]) -> Result<Progress, DownloadError> {
        let Some(region) = self.region.as_deref_mut() else {
            return Err(DownloadError::NotSized);
        };

        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.expected_len)
            .ok_or(DownloadError::OutOfBounds {
                offset,
                length: bytes.len(),
                size: self.expected_len,
            })?;

        region[offset..end].copy_from_slice(bytes);
        self.state = State::Receiving;

        let before = self.received;
        self.received = self.received.saturating_add(bytes.len());

        if self.progress_unit != 0 && before / self.progress_unit != self.received / self.progress_unit
        {
            Ok(Progress::Tick)
        } else {
            Ok(Progress::Silent)
        }
    }

    fn on_finish(&mut self, status: Status) -> Result<Progress, DownloadError> {
        if status.is_error() {
            return Err(DownloadError::Transport(status));
        }
        if self.region.is_none() {
            return Err(DownloadError::NotSized);
        }

        self.state = State::Complete;
        Ok(Progress::Silent)
    }
}

impl<A: RegionAllocator> Drop for DownloadSession<A> {
    fn drop(&mut self) {
        if let Some(region) = self.region.take() {
            self.allocator.free_pages(region);
        }
    }
}
