/// Error type shared by the store, the codec and the HTTP layer
///
/// Every variant maps to one human-readable message. The server sends that
/// message back to HTTP clients, and the command-line tool prints it.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ImgfsError>;

#[derive(Debug, Error)]
pub enum ImgfsError {
    /// Read, write, seek, send or receive failure on the store or a socket
    #[error("I/O Error")]
    Io(#[from] std::io::Error),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Invalid argument")]
    InvalidArgument,

    #[error("Not enough arguments")]
    NotEnoughArguments,

    #[error("Invalid command")]
    InvalidCommand,

    /// Image id empty or longer than the on-disk bound
    #[error("Invalid image ID")]
    InvalidImgId,

    #[error("Invalid max_files number")]
    MaxFiles,

    /// Unknown resolution tier, or a configured resolution out of range
    #[error("Invalid resolution(s)")]
    Resolutions,

    #[error("Image not found")]
    ImageNotFound,

    #[error("Existing image ID")]
    DuplicateId,

    #[error("imgFS is full")]
    ImgfsFull,

    /// Decoding or encoding failed inside the image codec
    #[error("Imglib error")]
    ImgLib(String),

    #[error("Malformed HTTP request")]
    MalformedRequest(&'static str),

    /// Worker spawn failure or a poisoned store lock
    #[error("Thread error")]
    Threading,
}

impl From<image::ImageError> for ImgfsError {
    fn from(err: image::ImageError) -> Self {
        ImgfsError::ImgLib(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for ImgfsError {
    fn from(_: std::collections::TryReserveError) -> Self {
        ImgfsError::OutOfMemory
    }
}

/// Allocate a zeroed byte buffer, reporting allocation failure as an error
pub(crate) fn try_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    Ok(buf)
}
