//! Background rendering of session images
//!
//! [`Prefetcher`] renders a session's image through a [`Renderer`] on a
//! spawned task and stores the result in the image cache, so the next
//! prompt can print it without waiting.

pub mod prefetcher;
pub mod renderer;

pub use prefetcher::{PrefetchResult, Prefetcher, DEFAULT_PROTOCOL};
pub use renderer::{CommandRenderer, Renderer};
