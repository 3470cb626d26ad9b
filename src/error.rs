//! Crate-wide error taxonomy.
//!
//! Each component owns a focused error enum (`ClientError`, `CodecError`, ...);
//! this module only defines the taxonomy shared across component boundaries.

use thiserror::Error;

/// Errors surfaced directly to a user of the library or CLI.
///
/// Transport failures, parse gaps, and per-publisher pipeline failures are
/// *not* represented here — they are absorbed locally and never propagate
/// past their owning component.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Session(#[from] crate::session::SessionError),

    #[error(transparent)]
    Codec(#[from] crate::codec::CodecError),

    #[error("batch cancelled")]
    Cancelled,
}
