/// On-disk data model of an imgFS file
///
/// The file is laid out as:
/// `[header][metadata[0..max_files)][blob region, append-only]`
///
/// Both the header and the metadata records have a fixed size. They are
/// mapped onto `#[repr(C)]` plain-old-data structs whose padding is spelled
/// out as fields, and every integer is stored little-endian.

use bytemuck::{Pod, Zeroable};
use std::fmt;

use crate::error::{ImgfsError, Result};

/// Label written in every header
pub const CAT_TXT: &str = "EPFL ImgFS 2024";

/// Capacity of the header label, including the NUL terminator
pub const MAX_IMGFS_NAME: usize = 31;

/// Longest image id that fits in a record (one byte is kept for NUL)
pub const MAX_IMG_ID: usize = 127;

/// Size in bytes of a SHA-256 digest
pub const SHA256_DIGEST_LENGTH: usize = 32;

/// Number of resolution tiers stored per image
pub const NB_RES: usize = 3;

/// Encoded size of [`Header`]
pub const HEADER_SIZE: usize = 64;

/// Encoded size of [`Metadata`]
pub const METADATA_SIZE: usize = 216;

/// Resolution tier of a stored image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Thumb,
    Small,
    Orig,
}

impl Resolution {
    /// Index of the tier in the `size`/`offset` arrays
    pub const fn index(self) -> usize {
        match self {
            Resolution::Thumb => 0,
            Resolution::Small => 1,
            Resolution::Orig => 2,
        }
    }

    /// Parse a user-supplied tier name
    ///
    /// Accepts `thumb`, `thumbnail`, `small`, `orig` and `original`.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "thumb" | "thumbnail" => Ok(Resolution::Thumb),
            "small" => Ok(Resolution::Small),
            "orig" | "original" => Ok(Resolution::Orig),
            _ => Err(ImgfsError::Resolutions),
        }
    }

    /// Suffix used when the command-line tool saves a tier to disk
    pub fn suffix(self) -> &'static str {
        match self {
            Resolution::Thumb => "thumb",
            Resolution::Small => "small",
            Resolution::Orig => "orig",
        }
    }
}

/// Fixed-size header at offset 0 of the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    /// Bumped on every successful insert or delete
    pub version: u32,
    /// Number of valid records
    pub nb_files: u32,
    /// Table capacity, fixed at creation
    pub max_files: u32,
    /// Thumbnail width/height then small width/height
    pub resized_res: [u16; 4],
}

impl Header {
    pub fn new(max_files: u32, thumb: (u16, u16), small: (u16, u16)) -> Self {
        Header {
            name: CAT_TXT.to_string(),
            version: 0,
            nb_files: 0,
            max_files,
            resized_res: [thumb.0, thumb.1, small.0, small.1],
        }
    }

    /// Configured target width for a resized tier
    pub fn target_width(&self, res: Resolution) -> Option<u32> {
        match res {
            Resolution::Thumb => Some(u32::from(self.resized_res[0])),
            Resolution::Small => Some(u32::from(self.resized_res[2])),
            Resolution::Orig => None,
        }
    }

    /// Byte offset of metadata record `index`
    pub fn record_offset(index: usize) -> u64 {
        (HEADER_SIZE + index * METADATA_SIZE) as u64
    }

    /// Byte offset at which the blob region begins
    pub fn blob_start(&self) -> u64 {
        Self::record_offset(self.max_files as usize)
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let raw = RawHeader {
            name: to_fixed(&self.name),
            version: self.version.to_le(),
            nb_files: self.nb_files.to_le(),
            max_files: self.max_files.to_le(),
            resized_res: self.resized_res.map(u16::to_le),
            _unused_32: 0,
            _unused_64: 0,
        };
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(bytemuck::bytes_of(&raw));
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(bytes) = bytes.get(..HEADER_SIZE) else {
            return Err(ImgfsError::InvalidArgument);
        };
        let raw: RawHeader = bytemuck::pod_read_unaligned(bytes);
        Ok(Header {
            name: from_fixed(&raw.name)?,
            version: u32::from_le(raw.version),
            nb_files: u32::from_le(raw.nb_files),
            max_files: u32::from_le(raw.max_files),
            resized_res: raw.resized_res.map(u16::from_le),
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*****************************************")?;
        writeln!(f, "********** IMGFS HEADER START ***********")?;
        writeln!(f, "TYPE: {:>31}", self.name)?;
        writeln!(f, "VERSION: {}", self.version)?;
        writeln!(f, "IMAGE COUNT: {}\t\tMAX IMAGES: {}", self.nb_files, self.max_files)?;
        writeln!(
            f,
            "THUMBNAIL: {} x {}\tSMALL: {} x {}",
            self.resized_res[0], self.resized_res[1], self.resized_res[2], self.resized_res[3]
        )?;
        writeln!(f, "*********** IMGFS HEADER END ************")?;
        writeln!(f, "*****************************************")
    }
}

/// One slot of the metadata table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    pub img_id: String,
    /// SHA-256 of the original-resolution bytes
    pub sha: [u8; SHA256_DIGEST_LENGTH],
    /// Original width and height in pixels
    pub orig_res: [u32; 2],
    /// Byte length per tier, 0 when the tier is not materialized
    pub size: [u32; NB_RES],
    /// Blob offset per tier, meaningful only when the matching size is > 0
    pub offset: [u64; NB_RES],
    pub is_valid: bool,
}

impl Metadata {
    /// Whether the given tier already has bytes in the blob region
    pub fn has(&self, res: Resolution) -> bool {
        self.size[res.index()] > 0
    }

    pub fn encode(&self) -> [u8; METADATA_SIZE] {
        let raw = RawMetadata {
            img_id: to_fixed(&self.img_id),
            sha: self.sha,
            orig_res: self.orig_res.map(u32::to_le),
            size: self.size.map(u32::to_le),
            _pad: 0,
            offset: self.offset.map(u64::to_le),
            is_valid: u16::from(self.is_valid).to_le(),
            _unused_16: 0,
            _pad_end: 0,
        };
        let mut out = [0u8; METADATA_SIZE];
        out.copy_from_slice(bytemuck::bytes_of(&raw));
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(bytes) = bytes.get(..METADATA_SIZE) else {
            return Err(ImgfsError::InvalidArgument);
        };
        let raw: RawMetadata = bytemuck::pod_read_unaligned(bytes);
        Ok(Metadata {
            img_id: from_fixed(&raw.img_id)?,
            sha: raw.sha,
            orig_res: raw.orig_res.map(u32::from_le),
            size: raw.size.map(u32::from_le),
            offset: raw.offset.map(u64::from_le),
            is_valid: u16::from_le(raw.is_valid) != 0,
        })
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = Resolution::Thumb.index();
        let s = Resolution::Small.index();
        let o = Resolution::Orig.index();
        writeln!(f, "IMAGE ID: {}", self.img_id)?;
        writeln!(f, "SHA: {}", hex::encode(self.sha))?;
        writeln!(f, "VALID: {}", u16::from(self.is_valid))?;
        writeln!(f, "UNUSED: 0")?;
        writeln!(f, "OFFSET ORIG. : {:<10}\t\tSIZE ORIG. : {}", self.offset[o], self.size[o])?;
        writeln!(f, "OFFSET THUMB.: {:<10}\t\tSIZE THUMB.: {}", self.offset[t], self.size[t])?;
        writeln!(f, "OFFSET SMALL : {:<10}\t\tSIZE SMALL : {}", self.offset[s], self.size[s])?;
        writeln!(f, "ORIGINAL: {} x {}", self.orig_res[0], self.orig_res[1])?;
        writeln!(f, "*****************************************")
    }
}

/// Check an image id against the on-disk bound
pub fn validate_img_id(img_id: &str) -> Result<()> {
    if img_id.is_empty() || img_id.len() > MAX_IMG_ID || img_id.as_bytes().contains(&0) {
        return Err(ImgfsError::InvalidImgId);
    }
    Ok(())
}

/// Header exactly as stored, little-endian
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct RawHeader {
    name: [u8; MAX_IMGFS_NAME + 1],
    version: u32,
    nb_files: u32,
    max_files: u32,
    resized_res: [u16; 4],
    _unused_32: u32,
    _unused_64: u64,
}

/// Metadata record exactly as stored, little-endian
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct RawMetadata {
    img_id: [u8; MAX_IMG_ID + 1],
    sha: [u8; SHA256_DIGEST_LENGTH],
    orig_res: [u32; 2],
    size: [u32; NB_RES],
    _pad: u32, // Align offsets to 8 bytes
    offset: [u64; NB_RES],
    is_valid: u16,
    _unused_16: u16,
    _pad_end: u32,
}

const _: () = assert!(std::mem::size_of::<RawHeader>() == HEADER_SIZE);
const _: () = assert!(std::mem::size_of::<RawMetadata>() == METADATA_SIZE);

/// Copy `s` into a NUL-padded field, keeping the last byte 0
fn to_fixed<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let len = s.len().min(N - 1);
    out[..len].copy_from_slice(&s.as_bytes()[..len]);
    out
}

fn from_fixed(raw: &[u8]) -> Result<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8(raw[..end].to_vec()).map_err(|_| ImgfsError::InvalidArgument)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut header = Header::new(10, (64, 64), (256, 256));
        header.version = 3;
        header.nb_files = 2;
        let bytes = header.encode();

        assert_eq!(&bytes[..CAT_TXT.len()], CAT_TXT.as_bytes());
        assert_eq!(bytes[31], 0);
        assert_eq!(&bytes[32..36], &3u32.to_le_bytes());
        assert_eq!(&bytes[36..40], &2u32.to_le_bytes());
        assert_eq!(&bytes[40..44], &10u32.to_le_bytes());
        assert_eq!(&bytes[44..46], &64u16.to_le_bytes());
        assert_eq!(&bytes[48..50], &256u16.to_le_bytes());
        assert_eq!(Header::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_metadata_layout() {
        let meta = Metadata {
            img_id: "pic1".into(),
            sha: [7u8; 32],
            orig_res: [1200, 800],
            size: [0, 0, 72876],
            offset: [0, 0, 21664],
            is_valid: true,
        };
        let bytes = meta.encode();

        assert_eq!(&bytes[..4], b"pic1");
        assert_eq!(bytes[128], 7);
        assert_eq!(&bytes[160..164], &1200u32.to_le_bytes());
        assert_eq!(&bytes[176..180], &72876u32.to_le_bytes());
        assert_eq!(&bytes[200..208], &21664u64.to_le_bytes());
        assert_eq!(&bytes[208..210], &1u16.to_le_bytes());
        assert_eq!(Metadata::decode(&bytes).unwrap(), meta);
    }

    #[test]
    fn test_padding_is_zeroed_and_short_input_rejected() {
        let meta = Metadata {
            img_id: "x".repeat(MAX_IMG_ID),
            size: [1, 2, 3],
            offset: [u64::MAX; NB_RES],
            is_valid: true,
            ..Metadata::default()
        };
        let bytes = meta.encode();
        assert_eq!(bytes[MAX_IMG_ID], 0);
        assert_eq!(&bytes[180..184], &[0; 4]);
        assert_eq!(&bytes[210..216], &[0; 6]);
        assert_eq!(Metadata::decode(&bytes).unwrap(), meta);

        assert!(matches!(Metadata::decode(&bytes[..100]), Err(ImgfsError::InvalidArgument)));
        assert!(matches!(Header::decode(&[0u8; 10]), Err(ImgfsError::InvalidArgument)));
    }

    #[test]
    fn test_record_offsets() {
        let header = Header::new(4, (64, 64), (256, 256));
        assert_eq!(Header::record_offset(0), HEADER_SIZE as u64);
        assert_eq!(Header::record_offset(2), (HEADER_SIZE + 2 * METADATA_SIZE) as u64);
        assert_eq!(header.blob_start(), (HEADER_SIZE + 4 * METADATA_SIZE) as u64);
    }

    #[test]
    fn test_resolution_names() {
        assert_eq!(Resolution::parse("thumbnail").unwrap(), Resolution::Thumb);
        assert_eq!(Resolution::parse("orig").unwrap(), Resolution::Orig);
        assert!(matches!(Resolution::parse("huge"), Err(ImgfsError::Resolutions)));
    }

    #[test]
    fn test_img_id_bounds() {
        assert!(validate_img_id("pic1").is_ok());
        assert!(validate_img_id(&"a".repeat(MAX_IMG_ID)).is_ok());
        assert!(matches!(
            validate_img_id(&"a".repeat(MAX_IMG_ID + 1)),
            Err(ImgfsError::InvalidImgId)
        ));
        assert!(validate_img_id("").is_err());
    }
}
