//! Scroll Resistance Surfaces
//!
//! Everything that reads or writes settings outside of a page:
//! - **Background**: seeds and repairs persisted settings on install/startup
//! - **Options**: host list management and curve editing
//! - **Popup**: per-site status and one-click listing of the active tab

pub mod background;
pub mod error;
pub mod options;
pub mod popup;

pub use background::*;
pub use error::*;
pub use options::*;
pub use popup::*;
