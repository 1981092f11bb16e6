//! Scroll Resistance Core - resistance curve and settings model
//!
//! This crate provides the pure primitives:
//! - Validated resistance parameters with documented defaults
//! - Whitelist/blacklist site filtering
//! - The accumulation/recovery engine that turns wheel input into a multiplier
//! - The persisted settings aggregate and its change-set merging

pub mod config;
pub mod engine;
pub mod filter;
pub mod host;
pub mod settings;

pub use config::*;
pub use engine::*;
pub use filter::*;
pub use host::*;
pub use settings::*;

/// Period of the recovery timer in seconds
pub const RECOVERY_INTERVAL_SECS: u64 = 1;

/// Default multiplier with no accumulated activity
pub const DEFAULT_BASE_MULTIPLIER: f64 = 1.5;

/// Default multiplier growth per scroll unit
pub const DEFAULT_INCREMENT_PER_SCROLL: f64 = 0.2;

/// Default multiplier ceiling
pub const DEFAULT_MAX_MULTIPLIER: f64 = 20.0;

/// Default scroll units shed per recovery tick
pub const DEFAULT_RECOVERY_PER_SECOND: f64 = 1.0;

/// Default wheel distance (in pixels) that counts as one scroll unit
pub const DEFAULT_DISTANCE_WEIGHT: f64 = 120.0;
