//! Scroll Resistance Store Layer
//!
//! Key-value settings storage shared by every page:
//! - `SettingsStore` trait with get/set/remove and a change feed
//! - In-memory store for tests and embedding
//! - JSON file store for the command line

pub mod file;
pub mod memory;
pub mod store;

pub use file::*;
pub use memory::*;
pub use store::*;
