//! NVDIMM Firmware Interface Table (NFIT).
//!
//! A single System Physical Address (SPA) range structure describes the downloaded
//! region, typed with the RAM disk type identifier. Operating systems with NVDIMM
//! support then expose the region as a persistent memory block device, which is how
//! the image stays reachable once the firmware is gone.

use super::{SdtHeader, put, seal};
use core::mem::offset_of;
use uefi_raw::Guid;

pub const SIGNATURE: [u8; 4] = *b"NFIT";
pub const REVISION: u8 = 1;

/// Structure type of an SPA range structure.
pub const SPA_RANGE_TYPE: u16 = 0;

/// `EFI_MEMORY_WB`: write-back cacheable.
pub const MEMORY_WB: u64 = 0x8;

// Wire layout only, the fields are never accessed.
#[allow(dead_code)]
#[derive(Clone, Copy, Debug)]
#[repr(C, packed)]
struct NfitHeader {
    header: SdtHeader,
    reserved: u32,
}

#[allow(dead_code)]
#[derive(Clone, Copy, Debug)]
#[repr(C, packed)]
/// System Physical Address range structure.
struct SpaRange {
    ty: u16,
    length: u16,
    spa_range_index: u16,
    flags: u16,
    reserved: u32,
    proximity_domain: u32,
    range_type: [u8; 16],
    base: u64,
    range_length: u64,
    mapping_attribute: u64,
}

crate::static_assert!(size_of::<NfitHeader>() == 40);
crate::static_assert!(size_of::<SpaRange>() == 56);

/// Total length of the table.
pub const LEN: usize = size_of::<NfitHeader>() + size_of::<SpaRange>();

#[allow(clippy::cast_possible_truncation)]
const TABLE_LENGTH: u32 = LEN as u32;
#[allow(clippy::cast_possible_truncation)]
const SPA_RANGE_LENGTH: u16 = size_of::<SpaRange>() as u16;

#[derive(Clone, Copy, PartialEq, Eq)]
/// A finished, checksummed NFIT.
pub struct Nfit {
    bytes: [u8; LEN],
}

impl Nfit {
    #[must_use]
    /// Builds the table for the physical range `base..base + length`.
    pub fn new(base: u64, length: u64, range_type: Guid) -> Self {
        let mut bytes = [0; LEN];

        SdtHeader::new(SIGNATURE, TABLE_LENGTH, REVISION, 0).write(&mut bytes);

        let spa = &mut bytes[size_of::<NfitHeader>()..];
        put(spa, offset_of!(SpaRange, ty), &SPA_RANGE_TYPE.to_le_bytes());
        put(spa, offset_of!(SpaRange, length), &SPA_RANGE_LENGTH.to_le_bytes());
        put(spa, offset_of!(SpaRange, range_type), &range_type.to_bytes());
        put(spa, offset_of!(SpaRange, base), &base.to_le_bytes());
        put(spa, offset_of!(SpaRange, range_length), &length.to_le_bytes());
        put(
            spa,
            offset_of!(SpaRange, mapping_attribute),
            &MEMORY_WB.to_le_bytes(),
        );

        seal(&mut bytes);

        Self { bytes }
    }

    #[must_use]
    #[inline]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        LEN
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl core::fmt::Debug for Nfit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Nfit")
            .field("length", &LEN)
            .field("checksum", &self.bytes[offset_of!(SdtHeader, checksum)])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{acpi::is_sealed, guid};

    fn read_u64(bytes: &[u8], offset: usize) -> u64 {
        u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
    }

    #[test]
    fn test_nfit_checksum() {
        let nfit = Nfit::new(0x1000_0000, 0x2000_0000, guid::VIRTUAL_DISK);
        assert!(is_sealed(nfit.as_bytes()));
        assert_eq!(crate::checksum::sum8(nfit.as_bytes()), 0);
    }

    #[test]
    fn test_nfit_header() {
        let nfit = Nfit::new(0x1000_0000, 0x2000_0000, guid::VIRTUAL_DISK);
        let bytes = nfit.as_bytes();

        assert_eq!(nfit.len(), 96);
        assert_eq!(bytes.len(), 96);
        assert_eq!(&bytes[0..4], b"NFIT");
        assert_eq!(&bytes[4..8], &[96, 0, 0, 0]);
        assert_eq!(bytes[8], 1);
        assert_eq!(&bytes[10..16], b"MEMDSK");
        assert_eq!(&bytes[16..24], b"MEMDISK ");
        // OEM revision, creator ID, creator revision and the reserved field.
        assert_eq!(&bytes[24..40], &[0; 16]);
    }

    #[test]
    fn test_nfit_spa_range() {
        let nfit = Nfit::new(0x1000_0000, 0x2000_0000, guid::VIRTUAL_CD);
        let spa = &nfit.as_bytes()[40..];

        assert_eq!(&spa[0..2], &[0, 0]);
        assert_eq!(&spa[2..4], &[56, 0]);
        // Index, flags, reserved and proximity domain.
        assert_eq!(&spa[4..16], &[0; 12]);
        assert_eq!(&spa[16..32], &guid::VIRTUAL_CD.to_bytes());
        assert_eq!(read_u64(spa, 32), 0x1000_0000);
        assert_eq!(read_u64(spa, 40), 0x2000_0000);
        assert_eq!(read_u64(spa, 48), MEMORY_WB);
    }

    #[test]
    fn test_nfit_checksum_tracks_fields() {
        let a = Nfit::new(0x1000_0000, 0x2000_0000, guid::VIRTUAL_DISK);
        let b = Nfit::new(0x1000_1000, 0x2000_0000, guid::VIRTUAL_DISK);

        assert_ne!(a.as_bytes()[9], b.as_bytes()[9]);
        assert!(is_sealed(b.as_bytes()));
    }
}
