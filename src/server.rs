//! Server side of the transfer endpoint.
//!
//! One resource, dispatched on the HTTP verb through an explicit match. Each
//! request is handled on its own thread; a failed request answers 500 (or
//! 400 for bad parameters) with a plain-text message and the server keeps
//! serving.

use crate::archive;
use crate::error::{Error, Result};
use crate::filter::FileFilter;
use crate::logger::Logger;
use crate::pipe::{self, ChannelReader};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

pub struct TransferServer {
    server: Server,
    logger: Arc<dyn Logger>,
}

impl TransferServer {
    pub fn bind(addr: &str, logger: Arc<dyn Logger>) -> Result<Self> {
        let server = Server::http(addr).map_err(|e| Error::Transport {
            message: format!("cannot bind {addr}: {e}"),
        })?;
        Ok(Self { server, logger })
    }

    /// Port actually bound; useful when binding to port 0.
    pub fn port(&self) -> u16 {
        self.server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    /// Serve forever, one handler thread per request.
    pub fn run(&self) {
        for request in self.server.incoming_requests() {
            let logger = self.logger.clone();
            thread::spawn(move || handle_request(request, logger));
        }
    }
}

/// What a successfully routed request answers with.
enum Reply {
    Empty,
    Headers(Vec<Header>),
    /// Archive stream of unknown length (chunked).
    Stream(ChannelReader),
    /// Raw file bytes with an explicit Content-Length.
    File(File),
}

fn handle_request(mut request: Request, logger: Arc<dyn Logger>) {
    let method = request.method().clone();
    let url = request.url().to_string();
    logger.debug(&format!("{} {}", method, url));

    match route(&method, &url, &mut request, &logger) {
        Ok(reply) => send_reply(request, reply, &logger),
        Err(err) => {
            logger.error(&format!("{} {} failed: {}", method, url, err));
            let status = match err {
                Error::InvalidRequest { .. } => 400,
                _ => 500,
            };
            let response =
                Response::from_string(err.to_string()).with_status_code(StatusCode(status));
            let _ = request.respond(response);
        }
    }
}

fn send_reply(request: Request, reply: Reply, logger: &Arc<dyn Logger>) {
    let outcome = match reply {
        Reply::Empty => request.respond(Response::empty(200)),
        Reply::Headers(headers) => {
            let mut response = Response::empty(200);
            for header in headers {
                response = response.with_header(header);
            }
            request.respond(response)
        }
        Reply::Stream(reader) => {
            request.respond(Response::new(StatusCode(200), Vec::new(), reader, None, None))
        }
        Reply::File(file) => request.respond(Response::from_file(file)),
    };
    if let Err(err) = outcome {
        logger.error(&format!("failed to write response: {err}"));
    }
}

fn route(
    method: &Method,
    url: &str,
    request: &mut Request,
    logger: &Arc<dyn Logger>,
) -> Result<Reply> {
    let params = parse_query(url);
    match method {
        Method::Get => handle_get(&params, logger),
        Method::Post => handle_post(&params, request, logger),
        Method::Delete => handle_delete(&params, logger),
        Method::Put => handle_put(&params, logger),
        Method::Head => handle_head(&params, logger),
        other => Err(Error::InvalidRequest {
            message: format!("unsupported method {other}"),
        }),
    }
}

fn handle_get(params: &[(String, String)], logger: &Arc<dyn Logger>) -> Result<Reply> {
    let path = path_or_dir_param(params)?;
    let filter = filter_param(params)?;

    let meta = fs::metadata(&path)?;
    if meta.is_dir() {
        logger.info(&format!("sending directory {}", path.display()));
        Ok(archive_response(path, filter, logger.clone()))
    } else {
        logger.info(&format!("sending file {}", path.display()));
        Ok(Reply::File(File::open(&path)?))
    }
}

/// Stream an archive into the response body. tiny_http consumes a `Read`,
/// so the encoder runs on a producer thread feeding the pipe. A failure
/// after headers went out truncates the stream before the end marker, which
/// the peer reports as an incomplete transfer.
fn archive_response(dir: PathBuf, filter: FileFilter, logger: Arc<dyn Logger>) -> Reply {
    let (writer, reader) = pipe::channel_pipe(pipe::DEFAULT_CHANNEL_BUFFER, pipe::DEFAULT_CHUNK_SIZE);
    thread::spawn(move || {
        if let Err(err) = archive::write_directory_tree(writer, &dir, &filter, true) {
            logger.error(&format!(
                "archive of {} aborted mid-stream: {}",
                dir.display(),
                err
            ));
        }
    });
    Reply::Stream(reader)
}

fn handle_post(
    params: &[(String, String)],
    request: &mut Request,
    logger: &Arc<dyn Logger>,
) -> Result<Reply> {
    let dir = param(params, "dir");
    let path = param(params, "path");

    match (dir, path) {
        (Some(_), Some(_)) => Err(Error::InvalidRequest {
            message: "cannot specify both 'dir' and 'path' query parameters".to_string(),
        }),
        (Some(dir), None) => {
            logger.info(&format!("receiving directory archive into {dir}"));
            archive::read_archive(request.as_reader(), Path::new(dir))?;
            Ok(Reply::Empty)
        }
        (None, Some(path)) => {
            logger.info(&format!("receiving file {path}"));
            let target = Path::new(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(target)?;
            io::copy(request.as_reader(), &mut out)?;
            Ok(Reply::Empty)
        }
        (None, None) => Err(Error::InvalidRequest {
            message: "missing 'dir' or 'path' query parameter".to_string(),
        }),
    }
}

fn handle_delete(params: &[(String, String)], logger: &Arc<dyn Logger>) -> Result<Reply> {
    let path = required_param(params, "path").map(PathBuf::from)?;
    let filter = filter_param(params)?;

    if fs::metadata(&path)?.is_dir() {
        logger.info(&format!("deleting directory {}", path.display()));
        filter.delete_filtered(&path)?;
    } else {
        logger.info(&format!("deleting file {}", path.display()));
        fs::remove_file(&path)?;
    }
    Ok(Reply::Empty)
}

fn handle_put(params: &[(String, String)], logger: &Arc<dyn Logger>) -> Result<Reply> {
    let action = required_param(params, "action")?;
    match action.to_ascii_lowercase().as_str() {
        "move" => {
            let old_path = required_param(params, "path")?;
            let new_path = required_param(params, "newpath")?;
            logger.info(&format!("moving {old_path} to {new_path}"));
            fs::rename(old_path, new_path)?;
            Ok(Reply::Empty)
        }
        other => Err(Error::InvalidRequest {
            message: format!("unsupported action '{other}'"),
        }),
    }
}

fn handle_head(params: &[(String, String)], logger: &Arc<dyn Logger>) -> Result<Reply> {
    let path = required_param(params, "path")?;
    logger.info(&format!("sending stats for {path}"));

    let mut headers = Vec::new();
    match fs::metadata(path) {
        Ok(meta) => {
            headers.push(flag_header("EXISTS", true));
            headers.push(flag_header("IS_DIR", meta.is_dir()));
        }
        Err(_) => headers.push(flag_header("EXISTS", false)),
    }
    Ok(Reply::Headers(headers))
}

fn flag_header(name: &str, value: bool) -> Header {
    let value = if value { "1" } else { "0" };
    Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap()
}

fn filter_param(params: &[(String, String)]) -> Result<FileFilter> {
    FileFilter::new(param(params, "filefilter"))
}

fn path_or_dir_param(params: &[(String, String)]) -> Result<PathBuf> {
    param(params, "path")
        .or_else(|| param(params, "dir"))
        .map(PathBuf::from)
        .ok_or_else(|| Error::InvalidRequest {
            message: "missing 'path' or 'dir' query parameter".to_string(),
        })
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.as_str())
}

fn required_param<'a>(params: &'a [(String, String)], name: &str) -> Result<&'a str> {
    param(params, name).ok_or_else(|| Error::InvalidRequest {
        message: format!("missing '{name}' query parameter"),
    })
}

fn parse_query(url: &str) -> Vec<(String, String)> {
    let query = match url.split_once('?') {
        Some((_, query)) => query,
        None => return Vec::new(),
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parsing_decodes_params() {
        let params = parse_query("/transfer?path=%2Ftmp%2Fmy+dir&filefilter=*.txt");
        assert_eq!(param(&params, "path"), Some("/tmp/my dir"));
        assert_eq!(param(&params, "filefilter"), Some("*.txt"));
        assert_eq!(param(&params, "dir"), None);
    }

    #[test]
    fn query_parsing_tolerates_junk() {
        assert!(parse_query("/transfer").is_empty());
        let params = parse_query("/t?&a=1&&b&c=%zz");
        assert_eq!(param(&params, "a"), Some("1"));
        assert_eq!(param(&params, "b"), None, "empty values count as absent");
        assert_eq!(param(&params, "c"), Some("%zz"));
    }
}
