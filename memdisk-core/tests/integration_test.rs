//! End-to-end scenarios of the memdisk building blocks

use memdisk_core::{
    PAGE_SIZE,
    acpi::{self, nfit::Nfit, ssdt::Ssdt},
    checksum::sum8,
    device_path,
    download::{DownloadSession, Event, MemoryClass, Progress, RegionAllocator, State},
    guid::DiskKind,
    options::{Advertise, BootOptions},
};
use uefi_raw::Status;

/// Hands out leaked heap pages and counts what comes back.
#[derive(Default)]
struct HeapPages {
    freed: usize,
}

impl RegionAllocator for &mut HeapPages {
    fn allocate_pages(
        &mut self,
        pages: usize,
        _class: MemoryClass,
    ) -> Result<&'static mut [u8], Status> {
        Ok(Box::leak(vec![0x5A; pages * PAGE_SIZE].into_boxed_slice()))
    }

    fn free_pages(&mut self, pages: &'static mut [u8]) {
        self.freed += pages.len() / PAGE_SIZE;
    }
}

fn deliver<A: RegionAllocator>(session: &mut DownloadSession<A>, offset: usize, bytes: &[u8]) {
    let event = session.classify(offset, bytes);
    session.handle(event).unwrap();
}

fn download(chunks: &[(usize, &[u8])], size: usize) -> Vec<u8> {
    let mut pages = HeapPages::default();
    let mut session = DownloadSession::new(&mut pages, MemoryClass::Reserved);

    deliver(&mut session, size, &[]);
    for &(offset, bytes) in chunks {
        deliver(&mut session, offset, bytes);
    }
    session
        .handle(Event::Finish {
            status: Status::SUCCESS,
        })
        .unwrap();
    assert_eq!(session.state(), State::Complete);

    let region = session.into_region().unwrap();
    region.as_bytes().to_vec()
}

#[test]
fn test_two_halves() {
    let a = [0xA1; 4096];
    let b = [0xB2; 4096];

    let region = download(&[(0, &a), (4096, &b)], 8192);

    assert_eq!(region.len(), 8192);
    assert_eq!(&region[..4096], &a);
    assert_eq!(&region[4096..], &b);
}

#[test]
fn test_chunk_order_does_not_matter() {
    let content = (0..10_000_u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();
    let (first, second) = content.split_at(6000);

    let whole = download(&[(0, &content)], content.len());
    let in_order = download(&[(0, first), (6000, second)], content.len());
    let reversed = download(&[(6000, second), (0, first)], content.len());

    assert_eq!(whole, in_order);
    assert_eq!(whole, reversed);
    assert_eq!(&whole[..content.len()], content.as_slice());
    // Padding up to the page boundary stays zeroed.
    assert_eq!(whole.len(), 3 * PAGE_SIZE);
    assert!(whole[content.len()..].iter().all(|&b| b == 0));
}

#[test]
fn test_overlapping_chunks() {
    let region = download(&[(0, &[1; 3000]), (2000, &[2; 3000])], 5000);

    assert!(region[..2000].iter().all(|&b| b == 1));
    assert!(region[2000..5000].iter().all(|&b| b == 2));
}

#[test]
fn test_probe_then_finish_is_zeroed() {
    for size in [1, 4096, 10_000] {
        let region = download(&[], size);
        assert_eq!(region.len(), size.div_ceil(PAGE_SIZE) * PAGE_SIZE);
        assert!(region.iter().all(|&b| b == 0));
    }
}

#[test]
fn test_failed_session_frees_region() {
    let mut pages = HeapPages::default();
    let mut session = DownloadSession::new(&mut pages, MemoryClass::Reserved);

    deliver(&mut session, 8192, &[]);
    deliver(&mut session, 0, &[1; 100]);
    assert!(
        session
            .handle(Event::Data {
                offset: 8100,
                bytes: &[2; 100],
            })
            .is_err()
    );
    let error = session
        .handle(Event::Finish {
            status: Status::SUCCESS,
        })
        .unwrap_err();
    assert_eq!(error.status(), Status::BAD_BUFFER_SIZE);
    assert!(session.into_region().is_err());

    assert_eq!(pages.freed, 2);
}

#[test]
fn test_progress_over_download() {
    let mut pages = HeapPages::default();
    let mut session = DownloadSession::new(&mut pages, MemoryClass::Reserved);

    let size = 1 << 20;
    deliver(&mut session, size, &[]);

    let chunk = [0_u8; 1460];
    let mut ticks = 0;
    for offset in (0..size).step_by(chunk.len()) {
        let len = chunk.len().min(size - offset);
        let event = session.classify(offset, &chunk[..len]);
        if session.handle(event).unwrap() == Progress::Tick {
            ticks += 1;
        }
    }

    assert_eq!(ticks, 20);
}

#[test]
fn test_advertisement_tables() {
    let options = BootOptions::from_load_options("memdisk.efi http://boot/disk.img nfit").unwrap();
    assert_eq!(options.advertise(), Advertise::Always);

    let nfit = Nfit::new(0x1000_0000, 0x2000_0000, options.disk_kind().type_guid());
    assert_eq!(sum8(nfit.as_bytes()), 0);
    assert!(acpi::is_sealed(nfit.as_bytes()));

    let ssdt = Ssdt::nvdimm_root();
    assert_eq!(sum8(ssdt.as_bytes()), 0);
    assert_eq!(&ssdt.as_bytes()[..4], b"SSDT");
}

#[test]
fn test_ram_disk_handle_matching() {
    fn node(node_type: u8, sub_type: u8, data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![node_type, sub_type];
        bytes.extend_from_slice(&u16::try_from(4 + data.len()).unwrap().to_le_bytes());
        bytes.extend_from_slice(data);
        bytes
    }
    let end = node(0x7F, 0xFF, &[]);

    let mut ram_disk = Vec::new();
    ram_disk.extend_from_slice(&0x1000_0000_u64.to_le_bytes());
    ram_disk.extend_from_slice(&0x1000_1FFF_u64.to_le_bytes());
    ram_disk.extend_from_slice(&DiskKind::Cd.type_guid().to_bytes());
    ram_disk.extend_from_slice(&0_u16.to_le_bytes());
    let ram_disk = node(0x04, 0x09, &ram_disk);

    let registered = [ram_disk.clone(), end.clone()].concat();
    let cd_partition = [ram_disk, node(0x04, 0x02, &[0; 20]), end.clone()].concat();
    let other_disk = [node(0x02, 0x01, &[0; 8]), node(0x04, 0x01, &[0; 38]), end].concat();

    assert!(device_path::is_prefix(&registered, &cd_partition));
    assert!(!device_path::is_prefix(&registered, &other_disk));
    assert_eq!(device_path::path_len(&cd_partition), Ok(cd_partition.len()));
}
