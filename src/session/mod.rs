//! Session management module
//!
//! A session pins one randomly chosen image to a process for its lifetime.

pub mod manager;
pub mod state;

pub use manager::SessionManager;
pub use state::{content_hash, list_images, Session};
