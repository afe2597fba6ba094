/// Listing of the valid images of a store
///
/// Two renderings exist: a human-readable report (header summary followed
/// by one block per valid record) and the JSON object served over HTTP.

use serde::Serialize;
use std::fmt;
use std::io::{Read, Seek, Write};

use super::imgfs::ImgFs;
use crate::error::{ImgfsError, Result};

/// Printed when a store holds no valid record
pub const EMPTY_MARKER: &str = "<< empty imgFS >>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Human-readable report
    Stdout,
    /// `{"Images": [...]}`
    Json,
}

#[derive(Serialize)]
struct Listing<'a> {
    #[serde(rename = "Images")]
    images: Vec<&'a str>,
}

/// Human-readable listing: header, then one block per valid record
struct Report<'a, F>(&'a ImgFs<F>);

impl<F: Read + Write + Seek> fmt::Display for Report<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.header())?;
        let mut valid = self.0.metadata().iter().filter(|m| m.is_valid).peekable();
        if valid.peek().is_none() {
            return writeln!(f, "{}", EMPTY_MARKER);
        }
        for meta in valid {
            write!(f, "{}", meta)?;
        }
        Ok(())
    }
}

/// Render the listing of `imgfs` in the requested mode
pub fn do_list<F: Read + Write + Seek>(imgfs: &ImgFs<F>, mode: ListMode) -> Result<String> {
    match mode {
        ListMode::Json => {
            let listing = Listing { images: imgfs.image_ids() };
            serde_json::to_string(&listing).map_err(|e| ImgfsError::Io(e.into()))
        }
        ListMode::Stdout => Ok(Report(imgfs).to_string()),
    }
}
