use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use super::data::{
    validate_img_id, Header, Metadata, Resolution, HEADER_SIZE, METADATA_SIZE,
};
use super::dedup;
use crate::codec;
use crate::error::{try_zeroed, ImgfsError, Result};

/// Largest thumbnail width/height accepted at creation
pub const MAX_THUMB_RES: u16 = 128;
/// Largest small-tier width/height accepted at creation
pub const MAX_SMALL_RES: u16 = 512;

pub const DEFAULT_MAX_FILES: u32 = 128;
pub const DEFAULT_THUMB_RES: u16 = 64;
pub const DEFAULT_SMALL_RES: u16 = 256;

/// Parameters fixed when a store is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    pub max_files: u32,
    pub thumb_res: (u16, u16),
    pub small_res: (u16, u16),
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            thumb_res: (DEFAULT_THUMB_RES, DEFAULT_THUMB_RES),
            small_res: (DEFAULT_SMALL_RES, DEFAULT_SMALL_RES),
        }
    }
}

impl CreateOptions {
    /// Check capacity and that each resolution lies within its tier's maximum
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(ImgfsError::MaxFiles);
        }
        let in_range = |(w, h): (u16, u16), max: u16| w > 0 && h > 0 && w <= max && h <= max;
        if !in_range(self.thumb_res, MAX_THUMB_RES) || !in_range(self.small_res, MAX_SMALL_RES) {
            return Err(ImgfsError::Resolutions);
        }
        Ok(())
    }
}

/// An open imgFS store
///
/// The in-memory header and metadata table are the authoritative copy while
/// the handle lives. Every mutation writes back only the records it touched.
pub struct ImgFs<F = File> {
    header: Header,
    metadata: Vec<Metadata>,
    file: F,
}

impl ImgFs<File> {
    /// Create a new, empty store file at `path`
    ///
    /// An existing file at `path` is truncated.
    pub fn create(path: impl AsRef<Path>, options: CreateOptions) -> Result<Self> {
        options.validate()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        let store = Self::format(file, options)?;
        info!(
            path = %path.as_ref().display(),
            max_files = options.max_files,
            "📁 Created imgFS store"
        );
        Ok(store)
    }

    /// Open an existing store file for reading and writing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Self::load(file)
    }
}

impl<F: Read + Write + Seek> ImgFs<F> {
    /// Write a fresh header and a zeroed table to `file`
    ///
    /// The stream is left positioned at its start.
    pub fn format(mut file: F, options: CreateOptions) -> Result<Self> {
        options.validate()?;
        let max_files = options.max_files as usize;

        let mut metadata = Vec::new();
        metadata.try_reserve_exact(max_files)?;
        metadata.resize(max_files, Metadata::default());
        let table = try_zeroed(max_files * METADATA_SIZE)?;

        let header = Header::new(options.max_files, options.thumb_res, options.small_res);

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.encode())?;
        file.write_all(&table)?;
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;

        Ok(ImgFs { header, metadata, file })
    }

    /// Read the header and the whole metadata table from `file`
    pub fn load(mut file: F) -> Result<Self> {
        let mut raw_header = [0u8; HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut raw_header)?;
        let header = Header::decode(&raw_header)?;

        if header.max_files == 0 || header.nb_files > header.max_files {
            return Err(ImgfsError::InvalidArgument);
        }

        // Check the stream holds the whole table before allocating for it
        let max_files = header.max_files as usize;
        let table_end = Header::record_offset(max_files);
        let stream_len = file.seek(SeekFrom::End(0))?;
        if stream_len < table_end {
            return Err(ImgfsError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file is shorter than its metadata table",
            )));
        }

        let mut table = try_zeroed(max_files * METADATA_SIZE)?;
        file.seek(SeekFrom::Start(Header::record_offset(0)))?;
        file.read_exact(&mut table)?;

        let mut metadata = Vec::new();
        metadata.try_reserve_exact(max_files)?;
        for raw in table.chunks_exact(METADATA_SIZE) {
            metadata.push(Metadata::decode(raw)?);
        }

        debug!(nb_files = header.nb_files, max_files, "Loaded imgFS table");
        Ok(ImgFs { header, metadata, file })
    }

    /// Flush and release the backing stream
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// All slots, valid or not, in index order
    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    pub fn stream(&self) -> &F {
        &self.file
    }

    /// Ids of the valid records, in slot order
    pub fn image_ids(&self) -> Vec<&str> {
        self.metadata
            .iter()
            .filter(|m| m.is_valid)
            .map(|m| m.img_id.as_str())
            .collect()
    }

    /// Slot index of the valid record named `img_id`
    fn find_valid(&self, img_id: &str) -> Option<usize> {
        self.metadata
            .iter()
            .position(|m| m.is_valid && m.img_id == img_id)
    }

    /// Insert an image under `img_id`
    ///
    /// Takes the lowest free slot. When another record already holds the same
    /// content, the new slot points at that record's bytes instead of
    /// appending a copy.
    ///
    /// # Returns
    /// * `Ok(index)` - Slot the image was stored in
    /// * `Err(ImgfsError::ImgfsFull)` - Every slot is taken
    /// * `Err(ImgfsError::DuplicateId)` - A valid record already uses `img_id`
    ///
    /// A failure while persisting leaves the in-memory record in place; the
    /// on-disk and in-memory views may then disagree until the store is
    /// reopened.
    pub fn insert(&mut self, image: &[u8], img_id: &str) -> Result<usize> {
        validate_img_id(img_id)?;
        let image_size = u32::try_from(image.len()).map_err(|_| ImgfsError::InvalidArgument)?;

        if self.header.nb_files >= self.header.max_files {
            return Err(ImgfsError::ImgfsFull);
        }

        // First fit: lowest free index
        let index = self
            .metadata
            .iter()
            .position(|m| !m.is_valid)
            .ok_or(ImgfsError::ImgfsFull)?;

        let sha = codec::sha256(image);
        let (width, height) = codec::decode_dimensions(image)?;

        let (size, offset) = match dedup::name_and_content_dedup(&self.metadata, index, img_id, &sha)? {
            Some(donor) => {
                let donor = &self.metadata[donor];
                (donor.size, donor.offset)
            }
            None => {
                let offset = self.append_blob(image)?;
                let orig = Resolution::Orig.index();
                let mut size = [0; 3];
                let mut offsets = [0; 3];
                size[orig] = image_size;
                offsets[orig] = offset;
                (size, offsets)
            }
        };

        self.metadata[index] = Metadata {
            img_id: img_id.to_string(),
            sha,
            orig_res: [width, height],
            size,
            offset,
            is_valid: true,
        };
        self.header.nb_files += 1;
        self.header.version += 1;

        self.write_header()?;
        self.write_record(index)?;

        debug!(img_id, index, version = self.header.version, "Inserted image");
        Ok(index)
    }

    /// Tombstone the record named `img_id`
    ///
    /// Blob bytes are never reclaimed. If either write fails the in-memory
    /// flag and counters are restored before the error is returned.
    pub fn delete(&mut self, img_id: &str) -> Result<()> {
        let index = self.find_valid(img_id).ok_or(ImgfsError::ImageNotFound)?;

        let previous = (self.header.nb_files, self.header.version);
        self.metadata[index].is_valid = false;
        self.header.nb_files = self.header.nb_files.saturating_sub(1);
        self.header.version += 1;

        let persisted = self.write_record(index).and_then(|()| self.write_header());
        if let Err(err) = persisted {
            self.metadata[index].is_valid = true;
            (self.header.nb_files, self.header.version) = previous;
            return Err(err);
        }

        debug!(img_id, index, version = self.header.version, "Deleted image");
        Ok(())
    }

    /// Read the bytes of `img_id` at resolution `res`
    ///
    /// A missing thumbnail or small variant is generated on the spot and
    /// appended to the store.
    pub fn read(&mut self, img_id: &str, res: Resolution) -> Result<Vec<u8>> {
        let index = self.find_valid(img_id).ok_or(ImgfsError::ImageNotFound)?;

        if res != Resolution::Orig && !self.metadata[index].has(res) {
            self.lazily_resize(res, index)?;
        }

        let meta = &self.metadata[index];
        let (offset, size) = (meta.offset[res.index()], meta.size[res.index()]);
        self.read_blob(offset, size)
    }

    /// Materialize the `res` variant of slot `index` if it is not stored yet
    pub fn lazily_resize(&mut self, res: Resolution, index: usize) -> Result<()> {
        let width = self.header.target_width(res).ok_or(ImgfsError::Resolutions)?;
        let meta = self.metadata.get(index).ok_or(ImgfsError::InvalidArgument)?;
        if meta.has(res) {
            return Ok(());
        }

        let orig = Resolution::Orig.index();
        let (orig_offset, orig_size) = (meta.offset[orig], meta.size[orig]);
        let original = self.read_blob(orig_offset, orig_size)?;
        let resized = codec::resize_to_width(&original, width)?;
        let size = u32::try_from(resized.len()).map_err(|_| ImgfsError::InvalidArgument)?;

        let offset = self.append_blob(&resized)?;

        let tier = res.index();
        self.metadata[index].size[tier] = size;
        self.metadata[index].offset[tier] = offset;

        // The whole table is rewritten; counters and ids are untouched.
        if let Err(err) = self.write_table() {
            self.metadata[index].size[tier] = 0;
            self.metadata[index].offset[tier] = 0;
            return Err(err);
        }

        debug!(index, ?res, size, offset, "Materialized resized tier");
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.encode())?;
        self.file.flush()?;
        Ok(())
    }

    fn write_record(&mut self, index: usize) -> Result<()> {
        self.file.seek(SeekFrom::Start(Header::record_offset(index)))?;
        self.file.write_all(&self.metadata[index].encode())?;
        self.file.flush()?;
        Ok(())
    }

    fn write_table(&mut self) -> Result<()> {
        let mut table = Vec::new();
        table.try_reserve_exact(self.metadata.len() * METADATA_SIZE)?;
        for meta in &self.metadata {
            table.extend_from_slice(&meta.encode());
        }
        self.file.seek(SeekFrom::Start(Header::record_offset(0)))?;
        self.file.write_all(&table)?;
        self.file.flush()?;
        Ok(())
    }

    /// Append `bytes` at the end of the blob region and return their offset
    fn append_blob(&mut self, bytes: &[u8]) -> Result<u64> {
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        let end = self.file.stream_position()?;
        Ok(end - bytes.len() as u64)
    }

    fn read_blob(&mut self, offset: u64, size: u32) -> Result<Vec<u8>> {
        let mut buf = try_zeroed(size as usize)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<F> std::fmt::Debug for ImgFs<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImgFs")
            .field("header", &self.header)
            .finish()
    }
}
