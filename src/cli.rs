//! Command-line surface: one binary covering the server and the client ops.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Tarpost - stream files and directory trees between machines over HTTP"
)]
pub struct Cli {
    /// Show debug-level output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the transfer server
    Serve {
        /// Bind address (host:port)
        #[arg(long, default_value = "0.0.0.0:60878")]
        bind: String,
    },
    /// Upload a local file or directory to the server
    Upload {
        /// Server URL, e.g. http://host:60878/
        server: String,
        /// Local file or directory to send
        local: PathBuf,
        /// Destination path on the server
        remote: String,
        /// Only send files whose name matches this glob pattern
        #[arg(long)]
        filefilter: Option<String>,
    },
    /// Download a remote file or directory from the server
    Download {
        server: String,
        /// Path on the server to fetch
        remote: String,
        /// Local destination path
        local: PathBuf,
        /// Only fetch files whose name matches this glob pattern
        #[arg(long)]
        filefilter: Option<String>,
    },
    /// Delete a remote path (whole subtree, or matching files only)
    Delete {
        server: String,
        remote: String,
        #[arg(long)]
        filefilter: Option<String>,
    },
    /// Rename a remote path
    Move {
        server: String,
        remote: String,
        new_remote: String,
    },
    /// Report whether a remote path exists and whether it is a directory
    Stat { server: String, remote: String },
}
