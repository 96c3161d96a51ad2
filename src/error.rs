//! Error types for ccm.

use std::io;

use thiserror::Error;

/// Result type alias for ccm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ccm.
///
/// Parse-time and session-connect failures are fatal before the event loop
/// starts; `LinkNotFound` and `ControllerUnavailable` are recoverable and
/// only ever affect the single event that raised them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed contact on line {line}: {reason}")]
    MalformedContact { line: usize, reason: String },

    #[error("no link between nodes {a} and {b}")]
    LinkNotFound { a: u32, b: u32 },

    #[error("link controller unavailable: {0}")]
    ControllerUnavailable(anyhow::Error),

    #[error("cannot reach emulation session {session}: {reason}")]
    SessionConnect { session: u32, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
