//! Error types for tarpost transfers.
//!
//! The classes matter to callers: a `Truncated` stream is a logically
//! incomplete transfer even when every byte-level operation succeeded, and
//! retry policy differs between transport failures and filesystem failures.
//! The library never retries on its own.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for transfer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying filesystem or stream calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised while walking a directory tree.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Malformed filename filter pattern. Configuration error, never retried.
    #[error("invalid filter pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// Local path handed to an upload does not exist.
    #[error("path does not exist: {0}")]
    MissingPath(PathBuf),

    /// HTTP transport failure (connection refused, timeout, bad URL).
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure outside of reqwest (e.g. server socket bind).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The server answered with a non-2xx status; body text carried verbatim.
    #[error("server returned status {status}: {body}")]
    Server { status: u16, body: String },

    /// Archive stream ended without the end-of-stream marker. The peer was
    /// killed mid-stream or the transport dropped the tail of the body.
    #[error("archive stream ended without end-of-stream marker, transfer is incomplete")]
    Truncated,

    /// The background producer task failed or panicked.
    #[error("archive producer failed: {message}")]
    Producer { message: String },

    /// Malformed request parameters (server side, reported as 400).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
