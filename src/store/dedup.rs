/// Name and content deduplication, run once per insert

use super::data::{Metadata, SHA256_DIGEST_LENGTH};
use crate::error::{ImgfsError, Result};

/// Compare a candidate slot against every other valid slot
///
/// The candidate is described by its `img_id` and content digest; the slot
/// at `index` itself is not read. For each valid slot the id is compared
/// before the digest.
///
/// # Returns
/// * `Ok(Some(donor))` - Slot whose blob bytes the candidate should share
/// * `Ok(None)` - Content is new; the caller appends the bytes
/// * `Err(ImgfsError::DuplicateId)` - A valid slot already uses `img_id`
pub fn name_and_content_dedup(
    table: &[Metadata],
    index: usize,
    img_id: &str,
    sha: &[u8; SHA256_DIGEST_LENGTH],
) -> Result<Option<usize>> {
    if index >= table.len() {
        return Err(ImgfsError::ImageNotFound);
    }

    let mut donor = None;
    for (i, meta) in table.iter().enumerate() {
        if i == index || !meta.is_valid {
            continue;
        }
        if meta.img_id == img_id {
            return Err(ImgfsError::DuplicateId);
        }
        if donor.is_none() && &meta.sha == sha {
            donor = Some(i);
        }
    }

    Ok(donor)
}
