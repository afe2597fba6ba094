mod common;

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use common::jpeg;
use imgfs::codec::decode_dimensions;
use imgfs::store::data::{Header, HEADER_SIZE, METADATA_SIZE};
use imgfs::store::listing::EMPTY_MARKER;
use imgfs::store::{do_list, ListMode};
use imgfs::{CreateOptions, ImgFs, ImgfsError, Resolution};
use tempfile::TempDir;

fn options(max_files: u32) -> CreateOptions {
    CreateOptions {
        max_files,
        thumb_res: (64, 64),
        small_res: (256, 256),
    }
}

fn file_len(dir: &TempDir) -> u64 {
    std::fs::metadata(dir.path().join("test.imgfs")).unwrap().len()
}

fn new_store(max_files: u32) -> (TempDir, ImgFs) {
    let dir = TempDir::new().unwrap();
    let store = ImgFs::create(dir.path().join("test.imgfs"), options(max_files)).unwrap();
    (dir, store)
}

#[test]
fn test_create_writes_header_and_zeroed_table() {
    let (dir, store) = new_store(10);
    assert_eq!(file_len(&dir), (HEADER_SIZE + 10 * METADATA_SIZE) as u64);
    assert_eq!(store.header().nb_files, 0);
    assert_eq!(store.header().version, 0);
    assert_eq!(store.metadata().len(), 10);
    assert!(store.metadata().iter().all(|m| !m.is_valid));
}

#[test]
fn test_create_rejects_bad_parameters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.imgfs");

    assert!(matches!(ImgFs::create(&path, options(0)), Err(ImgfsError::MaxFiles)));

    let too_wide = CreateOptions {
        thumb_res: (129, 64),
        ..options(4)
    };
    assert!(matches!(ImgFs::create(&path, too_wide), Err(ImgfsError::Resolutions)));

    let zero = CreateOptions {
        small_res: (0, 256),
        ..options(4)
    };
    assert!(matches!(ImgFs::create(&path, zero), Err(ImgfsError::Resolutions)));
}

#[test]
fn test_insert_then_read_original_round_trips() {
    let (_dir, mut store) = new_store(4);
    let image = jpeg(120, 80, 1);

    let index = store.insert(&image, "pic1").unwrap();
    assert_eq!(index, 0);
    assert_eq!(store.read("pic1", Resolution::Orig).unwrap(), image);

    let meta = &store.metadata()[0];
    assert_eq!(meta.orig_res, [120, 80]);
    assert!(!meta.has(Resolution::Thumb));
    assert!(!meta.has(Resolution::Small));
    assert_eq!(store.header().nb_files, 1);
    assert_eq!(store.header().version, 1);
}

#[test]
fn test_same_content_is_stored_once() {
    let (dir, mut store) = new_store(4);
    let image = jpeg(64, 64, 2);
    let before = file_len(&dir);

    store.insert(&image, "a").unwrap();
    store.insert(&image, "b").unwrap();

    assert_eq!(file_len(&dir), before + image.len() as u64);
    assert_eq!(store.read("b", Resolution::Orig).unwrap(), store.read("a", Resolution::Orig).unwrap());
    assert_eq!(store.metadata()[0].offset, store.metadata()[1].offset);
    assert_eq!(store.header().nb_files, 2);
}

#[test]
fn test_duplicate_id_rejected() {
    let (_dir, mut store) = new_store(4);
    store.insert(&jpeg(32, 32, 3), "pic").unwrap();

    let result = store.insert(&jpeg(32, 32, 4), "pic");
    assert!(matches!(result, Err(ImgfsError::DuplicateId)));
    assert_eq!(store.header().nb_files, 1);
    assert_eq!(store.image_ids(), ["pic"]);
}

#[test]
fn test_full_store_rejects_insert() {
    let (dir, mut store) = new_store(2);
    store.insert(&jpeg(16, 16, 5), "one").unwrap();
    store.insert(&jpeg(16, 16, 6), "two").unwrap();
    let len = file_len(&dir);
    let version = store.header().version;

    let result = store.insert(&jpeg(16, 16, 7), "three");
    assert!(matches!(result, Err(ImgfsError::ImgfsFull)));
    assert_eq!(file_len(&dir), len);
    assert_eq!(store.header().version, version);
}

#[test]
fn test_delete_frees_slot_for_reuse() {
    let (dir, mut store) = new_store(3);
    store.insert(&jpeg(16, 16, 8), "first").unwrap();
    store.insert(&jpeg(16, 16, 9), "second").unwrap();
    let len = file_len(&dir);

    store.delete("first").unwrap();
    assert_eq!(file_len(&dir), len);
    assert_eq!(store.header().nb_files, 1);
    assert_eq!(store.header().version, 3);
    assert!(matches!(store.read("first", Resolution::Orig), Err(ImgfsError::ImageNotFound)));
    assert!(matches!(store.delete("first"), Err(ImgfsError::ImageNotFound)));

    // Lowest free index is taken first
    assert_eq!(store.insert(&jpeg(16, 16, 10), "third").unwrap(), 0);
}

#[test]
fn test_shared_bytes_survive_owner_deletion() {
    let (_dir, mut store) = new_store(3);
    let image = jpeg(48, 48, 11);
    store.insert(&image, "owner").unwrap();
    store.insert(&image, "copy").unwrap();

    store.delete("owner").unwrap();
    assert_eq!(store.read("copy", Resolution::Orig).unwrap(), image);
}

#[test]
fn test_lazy_resize_happens_once() {
    let (dir, mut store) = new_store(2);
    store.insert(&jpeg(200, 100, 12), "wide").unwrap();
    let before = file_len(&dir);
    let version = store.header().version;

    let first = store.read("wide", Resolution::Thumb).unwrap();
    let after_first = file_len(&dir);
    let second = store.read("wide", Resolution::Thumb).unwrap();

    assert_eq!(first, second);
    assert_eq!(after_first, before + first.len() as u64);
    assert_eq!(file_len(&dir), after_first);
    assert_eq!(decode_dimensions(&first).unwrap(), (64, 32));
    assert_eq!(store.header().version, version);

    let meta = &store.metadata()[0];
    assert_eq!(meta.size[Resolution::Thumb.index()] as usize, first.len());
    assert_eq!(meta.offset[Resolution::Thumb.index()], before);

    let small = store.read("wide", Resolution::Small).unwrap();
    assert_eq!(decode_dimensions(&small).unwrap(), (256, 128));
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.imgfs");
    let image = jpeg(80, 60, 13);

    let mut store = ImgFs::create(&path, options(3)).unwrap();
    store.insert(&image, "keep").unwrap();
    store.insert(&jpeg(80, 60, 14), "drop").unwrap();
    store.delete("drop").unwrap();
    let thumb = store.read("keep", Resolution::Thumb).unwrap();
    let header = store.header().clone();
    let metadata = store.metadata().to_vec();
    store.close().unwrap();

    let mut reopened = ImgFs::open(&path).unwrap();
    assert_eq!(reopened.header(), &header);
    assert_eq!(reopened.metadata(), metadata.as_slice());
    assert_eq!(reopened.read("keep", Resolution::Orig).unwrap(), image);
    assert_eq!(reopened.read("keep", Resolution::Thumb).unwrap(), thumb);
}

#[test]
fn test_open_rejects_truncated_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.imgfs");
    std::fs::write(&path, [0u8; 10]).unwrap();
    assert!(matches!(ImgFs::open(&path), Err(ImgfsError::Io(_))));
}

#[test]
fn test_listing() {
    let (_dir, mut store) = new_store(4);

    assert_eq!(do_list(&store, ListMode::Json).unwrap(), r#"{"Images":[]}"#);
    let report = do_list(&store, ListMode::Stdout).unwrap();
    assert!(report.contains("IMGFS HEADER START"));
    assert!(report.ends_with(&format!("{}\n", EMPTY_MARKER)));

    store.insert(&jpeg(20, 20, 15), "alpha").unwrap();
    store.insert(&jpeg(20, 20, 16), "beta").unwrap();
    store.delete("alpha").unwrap();

    assert_eq!(do_list(&store, ListMode::Json).unwrap(), r#"{"Images":["beta"]}"#);
    let report = do_list(&store, ListMode::Stdout).unwrap();
    assert!(report.contains("IMAGE ID: beta"));
    assert!(!report.contains("IMAGE ID: alpha"));
    assert!(!report.contains(EMPTY_MARKER));
}

#[test]
fn test_invalid_ids() {
    let (_dir, mut store) = new_store(2);
    let long = "x".repeat(128);
    assert!(matches!(store.insert(&jpeg(8, 8, 17), &long), Err(ImgfsError::InvalidImgId)));
    assert!(matches!(store.insert(&jpeg(8, 8, 17), ""), Err(ImgfsError::InvalidImgId)));
    assert_eq!(store.header().nb_files, 0);
}

#[test]
fn test_undecodable_image_consumes_nothing() {
    let (dir, mut store) = new_store(2);
    let len = file_len(&dir);
    assert!(matches!(store.insert(b"plain text", "txt"), Err(ImgfsError::ImgLib(_))));
    assert_eq!(file_len(&dir), len);
    assert_eq!(store.header().nb_files, 0);
}

/// Writes seen by a [`JournaledStream`], and an optional failure point
#[derive(Default)]
struct Journal {
    writes: Vec<(u64, usize)>,
    fail_from: Option<usize>,
}

#[derive(Clone, Default)]
struct JournalHandle(Arc<Mutex<Journal>>);

impl JournalHandle {
    /// Let `n` more writes through, then fail every following one
    fn fail_after(&self, n: usize) {
        let mut journal = self.0.lock().unwrap();
        journal.fail_from = Some(journal.writes.len() + n);
    }

    fn heal(&self) {
        self.0.lock().unwrap().fail_from = None;
    }

    /// `(offset, len)` of each successful write since the last call
    fn take(&self) -> Vec<(u64, usize)> {
        std::mem::take(&mut self.0.lock().unwrap().writes)
    }
}

/// In-memory stream that records where each write lands
struct JournaledStream {
    inner: Cursor<Vec<u8>>,
    journal: JournalHandle,
}

impl Read for JournaledStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for JournaledStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut journal = self.journal.0.lock().unwrap();
        if journal.fail_from.is_some_and(|n| journal.writes.len() >= n) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        journal.writes.push((self.inner.position(), buf.len()));
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for JournaledStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

fn journaled_store() -> (ImgFs<JournaledStream>, JournalHandle) {
    let journal = JournalHandle::default();
    let stream = JournaledStream {
        inner: Cursor::new(Vec::new()),
        journal: journal.clone(),
    };
    let store = ImgFs::format(stream, options(3)).unwrap();
    journal.take();
    (store, journal)
}

/// Load a second handle from the bytes currently in `store`'s stream
fn reload(store: &ImgFs<JournaledStream>) -> ImgFs<Cursor<Vec<u8>>> {
    ImgFs::load(Cursor::new(store.stream().inner.get_ref().clone())).unwrap()
}

const HEADER: (u64, usize) = (0, HEADER_SIZE);

fn record(index: usize) -> (u64, usize) {
    (Header::record_offset(index), METADATA_SIZE)
}

#[test]
fn test_insert_writes_blob_header_then_one_record() {
    let (mut store, journal) = journaled_store();
    let image = jpeg(24, 24, 22);
    let end = store.stream().inner.get_ref().len() as u64;

    assert_eq!(store.insert(&image, "a").unwrap(), 0);
    assert_eq!(journal.take(), [(end, image.len()), HEADER, record(0)]);

    // Shared content appends nothing
    assert_eq!(store.insert(&image, "b").unwrap(), 1);
    assert_eq!(journal.take(), [HEADER, record(1)]);

    let reopened = reload(&store);
    assert_eq!(reopened.header(), store.header());
    assert_eq!(reopened.metadata(), store.metadata());
}

#[test]
fn test_delete_writes_record_then_header() {
    let (mut store, journal) = journaled_store();
    store.insert(&jpeg(16, 16, 23), "a").unwrap();
    store.insert(&jpeg(16, 16, 24), "b").unwrap();
    journal.take();

    store.delete("b").unwrap();
    assert_eq!(journal.take(), [record(1), HEADER]);

    let reopened = reload(&store);
    assert!(!reopened.metadata()[1].is_valid);
    assert_eq!(reopened.header().nb_files, 1);
    assert_eq!(reopened.header().version, 3);
}

#[test]
fn test_resize_rewrites_table_and_keeps_version() {
    let (mut store, journal) = journaled_store();
    store.insert(&jpeg(100, 50, 25), "pic").unwrap();
    let version = store.header().version;
    let end = store.stream().inner.get_ref().len() as u64;
    journal.take();

    let thumb = store.read("pic", Resolution::Thumb).unwrap();
    assert_eq!(journal.take(), [(end, thumb.len()), (Header::record_offset(0), 3 * METADATA_SIZE)]);

    let reopened = reload(&store);
    assert_eq!(reopened.header().version, version);
    assert_eq!(reopened.metadata(), store.metadata());
}

#[test]
fn test_failed_delete_rolls_back() {
    let (mut store, journal) = journaled_store();
    store.insert(&jpeg(16, 16, 18), "pic").unwrap();
    let header = store.header().clone();
    journal.take();

    // Record write goes through, header write fails
    journal.fail_after(1);
    assert!(matches!(store.delete("pic"), Err(ImgfsError::Io(_))));
    assert_eq!(journal.take(), [record(0)]);
    assert_eq!(store.header(), &header);
    assert!(store.metadata()[0].is_valid);

    journal.heal();
    store.delete("pic").unwrap();
    assert_eq!(store.header().nb_files, 0);
}

#[test]
fn test_failed_insert_persist_is_not_rolled_back() {
    let (mut store, journal) = journaled_store();
    let image = jpeg(16, 16, 19);
    store.insert(&image, "a").unwrap();

    // Shared content: nothing to append, the header write is the first to fail
    journal.fail_after(0);
    assert!(matches!(store.insert(&image, "b"), Err(ImgfsError::Io(_))));
    assert_eq!(store.image_ids(), ["a", "b"]);
    assert_eq!(store.header().nb_files, 2);
}

#[test]
fn test_failed_resize_leaves_tier_unset() {
    let (mut store, journal) = journaled_store();
    store.insert(&jpeg(100, 50, 20), "pic").unwrap();

    // Blob append succeeds, table rewrite fails
    journal.fail_after(1);
    assert!(matches!(store.read("pic", Resolution::Thumb), Err(ImgfsError::Io(_))));
    assert!(!store.metadata()[0].has(Resolution::Thumb));

    journal.heal();
    assert!(store.read("pic", Resolution::Thumb).is_ok());
    assert!(store.metadata()[0].has(Resolution::Thumb));
}

#[test]
fn test_load_rejects_table_larger_than_file() {
    let header = Header::new(5_000_000, (64, 64), (256, 256));
    let result = ImgFs::load(Cursor::new(header.encode().to_vec()));
    assert!(matches!(result, Err(ImgfsError::Io(ref err)) if err.kind() == io::ErrorKind::UnexpectedEof));
}
