//! Rendered-image cache
//!
//! Stores pre-rendered terminal image payloads (escape sequences) keyed by
//! the source image's content hash, the terminal protocol and the cell size.
//!
//! # On-disk layout
//!
//! ```text
//! <root>/
//!   <content-hash[0:8]>/
//!     <protocol>_<w>x<h>.render
//!     .render-*.tmp          in-progress atomic writes
//! ```

pub mod cache;

pub use cache::{ImageCache, ImageCacheStats, ImageKey, PruneReport};
