/// Storage engine
///
/// This module handles:
/// - The binary layout of header and metadata records (data.rs)
/// - The store handle: create, open, insert, delete, read (imgfs.rs)
/// - Duplicate detection run during insert (dedup.rs)
/// - Human and JSON listings (listing.rs)

pub mod data;
pub mod dedup;
pub mod imgfs;
pub mod listing;

pub use data::{Header, Metadata, Resolution};
pub use imgfs::{CreateOptions, ImgFs};
pub use listing::{do_list, ListMode};
