//! Advertisement of the RAM disk to the operating system.
//!
//! Without an NFIT entry, the operating system has no way to find the image once the
//! firmware is gone. Firmware implementing the ACPI SDT protocol publishes it for every
//! RAM disk it registers; otherwise, memdisk installs the tables itself.

use crate::{
    disk::RegisteredDisk,
    error::BootError,
    protocols::{
        self,
        acpi::{AcpiSdt, AcpiTable, TableKey},
    },
};
use log::{debug, info, warn};
use memdisk_core::{
    acpi::{nfit::Nfit, ssdt::Ssdt},
    options::Advertise,
};
use uefi::Status;

/// Installs the NFIT and its NVDIMM root device, if needed.
///
/// Failing to do so is not fatal: the loader can still boot from the RAM disk.
pub fn advertise(disk: &RegisteredDisk, mode: Advertise) -> Result<(), BootError> {
    if mode == Advertise::Never {
        debug!("ACPI advertisement disabled");
        return Ok(());
    }

    let Ok(acpi_table) = protocols::open::<AcpiTable>() else {
        warn!("Couldn't open ACPI Table protocol, NVDIMM will not work");
        return Ok(());
    };

    if mode == Advertise::Auto && protocols::is_available::<AcpiSdt>() {
        info!("Relying on the firmware to add the ACPI NFIT");
        return Ok(());
    }

    info!("Adding ACPI NFIT (nvdimm) table");

    let region = disk.region();
    let nfit = Nfit::new(region.base(), region.len() as u64, disk.kind().type_guid());
    let ssdt = Ssdt::nvdimm_root();

    // The NVDIMM root device is installed before the NFIT.
    install_all(&*acpi_table, [("SSDT", ssdt.as_bytes()), ("NFIT", nfit.as_bytes())])
}

/// Destination of the generated tables.
trait TableInstaller {
    fn install(&self, table: &[u8]) -> Result<TableKey, Status>;
}

impl TableInstaller for AcpiTable {
    fn install(&self, table: &[u8]) -> Result<TableKey, Status> {
        Self::install(self, table)
    }
}

/// Offers every table to the installer, even after a failure.
///
/// Returns the first failure.
fn install_all<const N: usize>(
    installer: &impl TableInstaller,
    tables: [(&'static str, &[u8]); N],
) -> Result<(), BootError> {
    let mut first_error = None;

    for (signature, table) in tables {
        match installer.install(table) {
            Ok(_) => debug!("ACPI {} ({} bytes) installed", signature, table.len()),
            Err(status) => {
                warn!("Couldn't add ACPI {} table ({:?})", signature, status);
                first_error.get_or_insert(BootError::Advertise { signature, status });
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use memdisk_core::guid::DiskKind;

    /// Records the signature of every offered table.
    struct Recorder {
        offered: RefCell<[[u8; 4]; 2]>,
        count: RefCell<usize>,
        rejected: &'static [u8; 4],
    }

    impl Recorder {
        const fn rejecting(rejected: &'static [u8; 4]) -> Self {
            Self {
                offered: RefCell::new([[0; 4]; 2]),
                count: RefCell::new(0),
                rejected,
            }
        }
    }

    impl TableInstaller for Recorder {
        fn install(&self, table: &[u8]) -> Result<TableKey, Status> {
            let mut count = self.count.borrow_mut();
            let signature: [u8; 4] = table[..4].try_into().unwrap();
            self.offered.borrow_mut()[*count] = signature;
            *count += 1;
            if &signature == self.rejected {
                Err(Status::OUT_OF_RESOURCES)
            } else {
                Ok(*count)
            }
        }
    }

    fn tables() -> (Ssdt, Nfit) {
        (
            Ssdt::nvdimm_root(),
            Nfit::new(0x1000_0000, 0x20_0000, DiskKind::Disk.type_guid()),
        )
    }

    #[test]
    fn test_ssdt_failure_still_installs_nfit() {
        let (ssdt, nfit) = tables();
        let installer = Recorder::rejecting(b"SSDT");

        let error = install_all(
            &installer,
            [("SSDT", ssdt.as_bytes()), ("NFIT", nfit.as_bytes())],
        )
        .unwrap_err();

        assert_eq!(*installer.count.borrow(), 2);
        assert_eq!(*installer.offered.borrow(), [*b"SSDT", *b"NFIT"]);
        let BootError::Advertise { signature, status } = &error else {
            panic!("unexpected error {error:?}");
        };
        assert_eq!(*signature, "SSDT");
        assert_eq!(*status, Status::OUT_OF_RESOURCES);
    }

    #[test]
    fn test_nfit_failure_is_reported() {
        let (ssdt, nfit) = tables();
        let installer = Recorder::rejecting(b"NFIT");

        let error = install_all(
            &installer,
            [("SSDT", ssdt.as_bytes()), ("NFIT", nfit.as_bytes())],
        )
        .unwrap_err();

        assert_eq!(*installer.count.borrow(), 2);
        assert!(matches!(error, BootError::Advertise { signature: "NFIT", .. }));
    }

    #[test]
    fn test_all_tables_installed() {
        let (ssdt, nfit) = tables();
        let installer = Recorder::rejecting(b"NONE");

        install_all(
            &installer,
            [("SSDT", ssdt.as_bytes()), ("NFIT", nfit.as_bytes())],
        )
        .unwrap();

        assert_eq!(*installer.offered.borrow(), [*b"SSDT", *b"NFIT"]);
    }
}
