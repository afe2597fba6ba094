/// Image codec capabilities used by the store
///
/// This module handles:
/// - Content hashing (SHA-256) for deduplication
/// - Reading the pixel dimensions of an original image
/// - Producing width-constrained JPEG variants for the resized tiers

pub mod hash;
pub mod resize;

pub use hash::sha256;
pub use resize::{decode_dimensions, resize_to_width};
