//! Errors shared by the settings surfaces

use resist_store::StoreError;
use thiserror::Error;

/// Errors from settings surfaces
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid host: {0:?}")]
    InvalidHost(String),

    #[error("Invalid mode: {0:?}")]
    InvalidMode(String),

    #[error("This page cannot be managed")]
    Unmanageable,

    #[error("Settings were never loaded; refusing to overwrite them")]
    NotLoaded,
}
