//! Tarpost library
//!
//! Streaming transfer of files and directory trees over HTTP: a tar encoder
//! feeds the request or response body while the transport drains it, and a
//! reserved trailing record lets the receiver detect truncated streams.

pub mod archive;
pub mod client;
pub mod error;
pub mod filter;
pub mod logger;
pub mod pipe;
pub mod pump;
pub mod server;

pub use error::{Error, Result};
