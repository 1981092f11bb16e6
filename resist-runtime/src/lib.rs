//! Scroll Resistance Page Runtime
//!
//! One controller per page, driven by a single message queue:
//! - Wheel events are gated by the site filter and remapped by the engine
//! - Store change notifications are merged and reset the engine
//! - A 1 Hz recovery timer exists only while the engine needs it

pub mod controller;
pub mod runtime;
pub mod viewport;

pub use controller::*;
pub use runtime::*;
pub use viewport::*;
