//! Firmware-backed pages for the download region.

use core::ptr::NonNull;
use memdisk_core::{
    PAGE_SIZE,
    download::{MemoryClass, RegionAllocator},
};
use uefi::{
    Status,
    boot::{self, AllocateType, MemoryType},
};

/// Allocates the download region through boot services.
///
/// Firmware memory is identity mapped, so the address of the returned slice is also its
/// physical address.
pub struct FirmwarePages;

#[must_use]
#[inline]
const fn memory_type(class: MemoryClass) -> MemoryType {
    match class {
        MemoryClass::Reserved => MemoryType::RESERVED,
        MemoryClass::BootServicesData => MemoryType::BOOT_SERVICES_DATA,
    }
}

impl RegionAllocator for FirmwarePages {
    fn allocate_pages(
        &mut self,
        pages: usize,
        class: MemoryClass,
    ) -> Result<&'static mut [u8], Status> {
        let ptr = boot::allocate_pages(AllocateType::AnyPages, memory_type(class), pages)
            .map_err(|error| error.status())?;

        // Safety:
        // `ptr` points to `pages` freshly allocated pages, which nothing else references.
        Ok(unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr(), pages * PAGE_SIZE) })
    }

    fn free_pages(&mut self, pages: &'static mut [u8]) {
        let count = pages.len() / PAGE_SIZE;
        let ptr = NonNull::from(pages).cast::<u8>();

        // Safety:
        // The pages were obtained from `allocate_pages` and the slice was consumed.
        if let Err(error) = unsafe { boot::free_pages(ptr, count) } {
            log::warn!("Couldn't free {} download pages ({:?})", count, error.status());
        }
    }
}
