//! imgFS: a single-file image store served over HTTP
//!
//! A store file holds a fixed header, a fixed-capacity metadata table and an
//! append-only region of image bytes. Images are deduplicated by content and
//! their thumbnail/small variants are generated the first time they are read.

pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod service;
pub mod store;

pub use error::{ImgfsError, Result};
pub use store::{CreateOptions, ImgFs, Resolution};
