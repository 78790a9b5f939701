//! prompt-pulse - persistent artifact cache and image prefetcher for
//! terminal prompt dashboards
//!
//! Collectors store their output in a size-bounded TTL/LRU [`cache::DiskCache`]
//! that survives restarts. Each shell gets one randomly chosen image
//! ([`session`]), which is rendered in the background ([`prefetch`]) and kept
//! in a content-addressed [`image::ImageCache`].

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod prefetch;
pub mod session;
pub mod ui;

pub use error::{PulseError, PulseResult};
