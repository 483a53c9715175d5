//! Client side of the transfer endpoint.
//!
//! Directory uploads stream through the pump; everything else is a plain
//! blocking request. Any non-2xx answer becomes [`Error::Server`] carrying
//! the status code and the response body text verbatim.

use crate::archive;
use crate::error::{Error, Result};
use crate::filter::FileFilter;
use crate::logger::Logger;
use crate::pump;
use reqwest::blocking::{Body, Client, Response};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Existence and kind of a remote path, as reported by a HEAD stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStat {
    pub exists: bool,
    pub is_dir: bool,
}

pub struct TransferClient {
    http: Client,
    url: String,
    logger: Arc<dyn Logger>,
}

impl TransferClient {
    /// `url` is the server's transfer resource, e.g. `http://host:60878/`.
    pub fn new(url: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            logger,
        }
    }

    /// Upload a local file or directory tree to `remote` on the server.
    /// Directories go up as a streamed archive, files as sized raw bytes.
    pub fn upload(&self, local: &Path, remote: &str, filter: &FileFilter) -> Result<()> {
        if local.is_dir() {
            self.upload_directory(local, remote, filter)
        } else if local.is_file() {
            self.upload_file(local, remote)
        } else {
            Err(Error::MissingPath(local.to_path_buf()))
        }
    }

    fn upload_directory(&self, local: &Path, remote: &str, filter: &FileFilter) -> Result<()> {
        self.logger.debug(&format!(
            "uploading directory {} to remote {}",
            local.display(),
            remote
        ));
        let root = local.to_path_buf();
        let filter = filter.clone();
        pump::pump(
            &self.http,
            &self.url,
            &[("dir", remote)],
            OCTET_STREAM,
            move |writer| archive::write_directory_tree(writer, &root, &filter, true),
            check_response,
        )
    }

    fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        let file = File::open(local)?;
        let len = file.metadata()?.len();
        self.logger.debug(&format!(
            "uploading file {} ({} bytes) to remote {}",
            local.display(),
            len,
            remote
        ));
        let response = self
            .http
            .post(&self.url)
            .query(&[("path", remote)])
            .header("Content-Type", OCTET_STREAM)
            .body(Body::sized(file, len))
            .send()?;
        check_response(response)
    }

    /// Download `remote` into `local`. A remote directory arrives as an
    /// archive stream and is integrity-checked; a remote file is raw bytes
    /// written straight to `local`.
    pub fn download(&self, remote: &str, local: &Path, filter: &FileFilter) -> Result<()> {
        let stat = self.stat(remote)?;
        if !stat.exists {
            return Err(Error::MissingPath(PathBuf::from(remote)));
        }

        let mut query: Vec<(&str, &str)> = vec![("path", remote)];
        if let Some(pattern) = filter.pattern() {
            query.push(("filefilter", pattern));
        }
        let mut response = self.http.get(&self.url).query(&query).send()?;
        if !response.status().is_success() {
            return Err(server_error(response));
        }

        if stat.is_dir {
            self.logger
                .debug(&format!("downloading directory {} to {}", remote, local.display()));
            archive::read_archive(response, local)
        } else {
            self.logger
                .debug(&format!("downloading file {} to {}", remote, local.display()));
            if let Some(parent) = local.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(local)?;
            io::copy(&mut response, &mut out)?;
            Ok(())
        }
    }

    /// Delete `remote`: the whole subtree without a filter, matching files
    /// only with one.
    pub fn delete(&self, remote: &str, filter: &FileFilter) -> Result<()> {
        let mut query: Vec<(&str, &str)> = vec![("path", remote)];
        if let Some(pattern) = filter.pattern() {
            query.push(("filefilter", pattern));
        }
        let response = self.http.delete(&self.url).query(&query).send()?;
        check_response(response)
    }

    /// Rename `remote` to `new_remote` on the server.
    pub fn rename(&self, remote: &str, new_remote: &str) -> Result<()> {
        let response = self
            .http
            .put(&self.url)
            .query(&[("action", "move"), ("path", remote), ("newpath", new_remote)])
            .send()?;
        check_response(response)
    }

    /// Ask the server whether `remote` exists and whether it is a directory.
    pub fn stat(&self, remote: &str) -> Result<PathStat> {
        let response = self
            .http
            .head(&self.url)
            .query(&[("path", remote)])
            .send()?;
        if !response.status().is_success() {
            return Err(server_error(response));
        }

        let header_flag = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == "1")
                .unwrap_or(false)
        };
        Ok(PathStat {
            exists: header_flag("EXISTS"),
            is_dir: header_flag("IS_DIR"),
        })
    }
}

/// Shared non-2xx handling: surface the status and the body text verbatim.
pub fn check_response(response: Response) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(server_error(response))
}

fn server_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Error::Server { status, body }
}
