//! ACPI tables advertising the downloaded region to the operating system.
//!
//! Tables are serialized field by field in little-endian order into fixed-size byte
//! buffers. The `#[repr(C, packed)]` structures only describe the wire layout: offsets
//! and sizes are derived from them, never their in-memory representation.

use crate::checksum::checksum8;
use core::mem::offset_of;

pub mod nfit;
pub mod ssdt;

/// OEM ID of every table built here.
pub const OEM_ID: [u8; 6] = *b"MEMDSK";
/// OEM table ID of every table built here.
pub const OEM_TABLE_ID: [u8; 8] = *b"MEMDISK ";

#[derive(Clone, Copy, Debug)]
#[repr(C, packed)]
/// System Descriptor Table (SDT) header.
pub struct SdtHeader {
    signature: [u8; 4],
    length: u32,
    revision: u8,
    checksum: u8,
    oem_id: [u8; 6],
    oem_table_id: [u8; 8],
    oem_revision: u32,
    creator_id: [u8; 4],
    creator_revision: u32,
}

crate::static_assert!(size_of::<SdtHeader>() == 36);

impl SdtHeader {
    pub const LEN: usize = size_of::<Self>();

    #[must_use]
    #[inline]
    /// Creates a header with the memdisk OEM fields and an empty checksum.
    pub const fn new(signature: [u8; 4], length: u32, revision: u8, oem_revision: u32) -> Self {
        Self {
            signature,
            length,
            revision,
            checksum: 0,
            oem_id: OEM_ID,
            oem_table_id: OEM_TABLE_ID,
            oem_revision,
            creator_id: [0; 4],
            creator_revision: 0,
        }
    }

    /// Writes the header at the start of `table`.
    ///
    /// ## Panics
    ///
    /// Panics if `table` is shorter than [`SdtHeader::LEN`].
    pub fn write(&self, table: &mut [u8]) {
        let header = &mut table[..Self::LEN];
        let (signature, length, oem_revision, creator_revision) = (
            self.signature,
            self.length,
            self.oem_revision,
            self.creator_revision,
        );

        put(header, offset_of!(Self, signature), &signature);
        put(header, offset_of!(Self, length), &length.to_le_bytes());
        header[offset_of!(Self, revision)] = self.revision;
        header[offset_of!(Self, checksum)] = self.checksum;
        put(header, offset_of!(Self, oem_id), &self.oem_id);
        put(header, offset_of!(Self, oem_table_id), &self.oem_table_id);
        put(header, offset_of!(Self, oem_revision), &oem_revision.to_le_bytes());
        put(header, offset_of!(Self, creator_id), &self.creator_id);
        put(
            header,
            offset_of!(Self, creator_revision),
            &creator_revision.to_le_bytes(),
        );
    }
}

/// Computes and stores the header checksum of a finished table.
///
/// The checksum covers the whole table, with the checksum field itself zeroed.
pub fn seal(table: &mut [u8]) {
    let field = offset_of!(SdtHeader, checksum);
    table[field] = 0;
    table[field] = checksum8(table);
}

#[must_use]
/// Whether the table's bytes sum to zero.
pub fn is_sealed(table: &[u8]) -> bool {
    crate::checksum::sum8(table) == 0
}

#[inline]
fn put(buffer: &mut [u8], offset: usize, bytes: &[u8]) {
    buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut table = [0xEE_u8; 40];
        SdtHeader::new(*b"TEST", 40, 3, 0x1234_5678).write(&mut table);

        assert_eq!(&table[0..4], b"TEST");
        assert_eq!(&table[4..8], &[40, 0, 0, 0]);
        assert_eq!(table[8], 3);
        assert_eq!(table[9], 0);
        assert_eq!(&table[10..16], b"MEMDSK");
        assert_eq!(&table[16..24], b"MEMDISK ");
        assert_eq!(&table[24..28], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(&table[28..36], &[0; 8]);
        // Past the header.
        assert_eq!(&table[36..], &[0xEE; 4]);
    }

    #[test]
    fn test_oem_table_id_value() {
        // Firmware tables commonly show it as a little-endian integer.
        assert_eq!(u64::from_le_bytes(OEM_TABLE_ID), 0x204b_5349_444d_454d);
    }

    #[test]
    fn test_seal() {
        let mut table = [0_u8; 64];
        SdtHeader::new(*b"SEAL", 64, 1, 0).write(&mut table);
        table[40..48].copy_from_slice(&0xDEAD_BEEF_CAFE_F00D_u64.to_le_bytes());
        table[9] = 0x42;

        seal(&mut table);
        assert!(is_sealed(&table));

        // Sealing twice is stable.
        let checksum = table[9];
        seal(&mut table);
        assert_eq!(table[9], checksum);
    }
}
