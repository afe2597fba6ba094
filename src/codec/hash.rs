use sha2::{Digest, Sha256};

use crate::store::data::SHA256_DIGEST_LENGTH;

/// SHA-256 digest of an image's original bytes
pub fn sha256(bytes: &[u8]) -> [u8; SHA256_DIGEST_LENGTH] {
    Sha256::digest(bytes).into()
}
