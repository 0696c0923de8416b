//! Well-known identifiers used to describe the downloaded region.

use uefi_raw::{Guid, guid};

/// RAM disk type of a virtual hard disk.
pub const VIRTUAL_DISK: Guid = guid!("77ab535a-45fc-624b-5560-f7b281d1f96e");

/// RAM disk type of a virtual CD.
pub const VIRTUAL_CD: Guid = guid!("3d5abd30-4175-87ce-6d64-d2ade523c4bb");

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// The kind of block device the downloaded image is exposed as.
pub enum DiskKind {
    #[default]
    Disk,
    Cd,
}

impl DiskKind {
    #[must_use]
    #[inline]
    /// Returns the RAM disk type identifier, also used as the NFIT address range type.
    pub const fn type_guid(self) -> Guid {
        match self {
            Self::Disk => VIRTUAL_DISK,
            Self::Cd => VIRTUAL_CD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_wire_layout() {
        // The first three fields are little-endian on the wire.
        let bytes = VIRTUAL_DISK.to_bytes();
        assert_eq!(&bytes[..4], &[0x5a, 0x53, 0xab, 0x77]);
        assert_eq!(&bytes[4..8], &[0xfc, 0x45, 0x4b, 0x62]);
        assert_eq!(&bytes[8..], &[0x55, 0x60, 0xf7, 0xb2, 0x81, 0xd1, 0xf9, 0x6e]);
    }

    #[test]
    fn test_disk_kind_guid() {
        assert_eq!(DiskKind::default().type_guid(), VIRTUAL_DISK);
        assert_eq!(DiskKind::Cd.type_guid(), VIRTUAL_CD);
    }
}
