//! Secondary System Description Table declaring the NVDIMM root device.
//!
//! Operating systems only bind the NFIT once an `ACPI0012` device exists in the
//! namespace. Firmware without NVDIMM support has none, so it is provided here:
//!
//! ```text
//! Scope (\_SB) {
//!     Device (NVDR) {
//!         Name (_HID, "ACPI0012")
//!         Name (_STR, Unicode ("NVDIMM Root Device"))
//!         Method (_STA, 0) { Return (0x0F) }
//!     }
//! }
//! ```

use super::{SdtHeader, seal};

pub const SIGNATURE: [u8; 4] = *b"SSDT";
pub const REVISION: u8 = 2;
pub const OEM_REVISION: u32 = 0x1000;

/// Capacity of the table buffer.
const CAPACITY: usize = 128;

const ROOT_CHAR: u8 = b'\\';
const NAME_OP: u8 = 0x08;
const BYTE_PREFIX: u8 = 0x0A;
const STRING_PREFIX: u8 = 0x0D;
const SCOPE_OP: u8 = 0x10;
const BUFFER_OP: u8 = 0x11;
const METHOD_OP: u8 = 0x14;
const RETURN_OP: u8 = 0xA4;
const EXT_OP_PREFIX: u8 = 0x5B;
const DEVICE_OP: u8 = 0x82;

const DEVICE_NAME: &str = "NVDIMM Root Device";

#[derive(Clone, Copy, PartialEq, Eq)]
/// A finished, checksummed SSDT.
pub struct Ssdt {
    bytes: [u8; CAPACITY],
    len: usize,
}

impl Ssdt {
    #[must_use]
    /// Builds the table declaring `\_SB.NVDR`.
    pub fn nvdimm_root() -> Self {
        let mut aml = AmlWriter::new();
        aml.skip(SdtHeader::LEN);

        aml.package(&[SCOPE_OP], |aml| {
            aml.bytes(&[ROOT_CHAR]);
            aml.bytes(b"_SB_");
            aml.package(&[EXT_OP_PREFIX, DEVICE_OP], |aml| {
                aml.bytes(b"NVDR");

                aml.bytes(&[NAME_OP]);
                aml.bytes(b"_HID");
                aml.bytes(&[STRING_PREFIX]);
                aml.bytes(b"ACPI0012\0");

                aml.bytes(&[NAME_OP]);
                aml.bytes(b"_STR");
                aml.unicode(DEVICE_NAME);

                aml.package(&[METHOD_OP], |aml| {
                    aml.bytes(b"_STA");
                    // No arguments, not serialized.
                    aml.bytes(&[0x00]);
                    aml.bytes(&[RETURN_OP, BYTE_PREFIX, 0x0F]);
                });
            });
        });

        let (mut bytes, len) = aml.finish();

        #[allow(clippy::cast_possible_truncation)]
        let header = SdtHeader::new(SIGNATURE, len as u32, REVISION, OEM_REVISION);
        header.write(&mut bytes);
        seal(&mut bytes[..len]);

        Self { bytes, len }
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for Ssdt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ssdt")
            .field("length", &self.len)
            .finish_non_exhaustive()
    }
}

/// Appends AML to a fixed buffer.
///
/// Running out of space is a bug in the table definitions above, so it panics.
struct AmlWriter {
    bytes: [u8; CAPACITY],
    len: usize,
}

impl AmlWriter {
    const fn new() -> Self {
        Self {
            bytes: [0; CAPACITY],
            len: 0,
        }
    }

    const fn skip(&mut self, count: usize) {
        self.len += count;
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.bytes[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Writes `opcode`, then a `PkgLength` covering everything `body` writes.
    fn package(&mut self, opcode: &[u8], body: impl FnOnce(&mut Self)) {
        self.bytes(opcode);
        let start = self.len;
        body(self);

        let encoded = encode_pkg_length(self.len - start);
        let encoded = &encoded.bytes[..encoded.len];

        // Shift the body to make room for the length in front of it.
        self.bytes[start..self.len + encoded.len()].rotate_right(encoded.len());
        self.bytes[start..start + encoded.len()].copy_from_slice(encoded);
        self.len += encoded.len();
    }

    /// Writes a `Unicode ()` string, which ASL compiles to a UTF-16 buffer.
    fn unicode(&mut self, ascii: &str) {
        let size = (ascii.len() + 1) * 2;
        self.package(&[BUFFER_OP], |aml| {
            #[allow(clippy::cast_possible_truncation)]
            aml.bytes(&[BYTE_PREFIX, size as u8]);
            for c in ascii.bytes().chain(core::iter::once(0)) {
                aml.bytes(&u16::from(c).to_le_bytes());
            }
        });
    }

    const fn finish(self) -> ([u8; CAPACITY], usize) {
        (self.bytes, self.len)
    }
}

struct PkgLength {
    bytes: [u8; 4],
    len: usize,
}

#[allow(clippy::cast_possible_truncation)]
/// Encodes the `PkgLength` of a package whose body is `body_len` bytes long.
///
/// The encoded value includes the bytes of the encoding itself.
const fn encode_pkg_length(body_len: usize) -> PkgLength {
    if body_len < 0x3F {
        return PkgLength {
            bytes: [(body_len + 1) as u8, 0, 0, 0],
            len: 1,
        };
    }

    let mut extra = 1;
    while extra < 3 && body_len + 1 + extra >= 1 << (4 + 8 * extra) {
        extra += 1;
    }
    let total = body_len + 1 + extra;

    let mut bytes = [0; 4];
    bytes[0] = ((extra as u8) << 6) | (total & 0xF) as u8;
    let mut i = 1;
    while i <= extra {
        bytes[i] = (total >> (4 + 8 * (i - 1))) as u8;
        i += 1;
    }

    PkgLength {
        bytes,
        len: extra + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acpi::is_sealed;

    fn encoded(body_len: usize) -> ([u8; 4], usize) {
        let pkg = encode_pkg_length(body_len);
        (pkg.bytes, pkg.len)
    }

    #[test]
    fn test_pkg_length_encoding() {
        assert_eq!(encoded(0), ([0x01, 0, 0, 0], 1));
        assert_eq!(encoded(0x3E), ([0x3F, 0, 0, 0], 1));
        // 0x3F + 2 = 0x41
        assert_eq!(encoded(0x3F), ([0x41, 0x04, 0, 0], 2));
        assert_eq!(encoded(76), ([0x4E, 0x04, 0, 0], 2));
        // 0xFFD + 2 = 0xFFF, the largest two-byte encoding.
        assert_eq!(encoded(0xFFD), ([0x4F, 0xFF, 0, 0], 2));
        // 0xFFE + 3 = 0x1001
        assert_eq!(encoded(0xFFE), ([0x81, 0x00, 0x01, 0], 3));
    }

    #[test]
    fn test_ssdt_header() {
        let ssdt = Ssdt::nvdimm_root();
        let bytes = ssdt.as_bytes();

        assert_eq!(ssdt.len(), 124);
        assert_eq!(&bytes[0..4], b"SSDT");
        assert_eq!(&bytes[4..8], &[124, 0, 0, 0]);
        assert_eq!(bytes[8], 2);
        assert_eq!(&bytes[10..16], b"MEMDSK");
        assert_eq!(&bytes[16..24], b"MEMDISK ");
        assert_eq!(&bytes[24..28], &[0x00, 0x10, 0x00, 0x00]);
        assert!(is_sealed(bytes));
    }

    #[test]
    fn test_ssdt_aml() {
        let ssdt = Ssdt::nvdimm_root();
        let aml = &ssdt.as_bytes()[SdtHeader::LEN..];

        // Scope (\_SB), 85 bytes of body.
        assert_eq!(&aml[..8], &[0x10, 0x47, 0x05, b'\\', b'_', b'S', b'B', b'_']);
        // Device (NVDR), 76 bytes of body.
        assert_eq!(&aml[8..16], &[0x5B, 0x82, 0x4E, 0x04, b'N', b'V', b'D', b'R']);
        assert_eq!(&aml[16..31], b"\x08_HID\x0DACPI0012\0");
        // Name (_STR, Buffer (38) {...})
        assert_eq!(&aml[31..40], &[0x08, b'_', b'S', b'T', b'R', 0x11, 0x29, 0x0A, 0x26]);
        assert_eq!(&aml[40..44], &[b'N', 0, b'V', 0]);
        assert_eq!(&aml[76..78], &[0, 0]);
        // Method (_STA, 0) { Return (0x0F) }
        assert_eq!(
            &aml[78..],
            &[0x14, 0x09, b'_', b'S', b'T', b'A', 0x00, 0xA4, 0x0A, 0x0F]
        );
    }
}
