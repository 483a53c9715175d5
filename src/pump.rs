//! Bridges a synchronous archive producer with an HTTP POST whose body is
//! consumed by the transport.
//!
//! The producer runs on its own thread and writes into the pipe; the calling
//! thread blocks in the HTTP client, which drains the pipe's read end as the
//! request body. The producer is always joined before the call returns, on
//! success and on every error path, so a failure that surfaces after the
//! last byte was read is never lost.

use crate::error::{Error, Result};
use crate::pipe::{self, ChannelWriter};
use reqwest::blocking::{Body, Client, Response};
use std::thread;

/// POST to `url` with a streamed body.
///
/// `producer` receives the write end of the pipe and is expected to encode
/// an archive into it. `check` inspects the completed response (status,
/// body). Outcomes are reconciled in a fixed order: transport failure first,
/// then the `check` verdict, then any captured producer failure.
pub fn pump<F, C>(
    http: &Client,
    url: &str,
    query: &[(&str, &str)],
    content_type: &str,
    producer: F,
    check: C,
) -> Result<()>
where
    F: FnOnce(ChannelWriter) -> Result<()> + Send + 'static,
    C: FnOnce(Response) -> Result<()>,
{
    let (writer, reader) = pipe::channel_pipe(pipe::DEFAULT_CHANNEL_BUFFER, pipe::DEFAULT_CHUNK_SIZE);

    let handle = thread::Builder::new()
        .name("archive-producer".to_string())
        .spawn(move || producer(writer))?;

    let response = http
        .post(url)
        .query(query)
        .header("Content-Type", content_type)
        .body(Body::new(reader))
        .send();

    // Join unconditionally. If the transport bailed out early, the dropped
    // read end has already broken the pipe and unblocked the producer.
    let produced = match handle.join() {
        Ok(outcome) => outcome,
        Err(panic) => Err(Error::Producer {
            message: panic_message(panic),
        }),
    };

    let response = response?;
    check(response)?;
    produced
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "producer thread panicked".to_string()
    }
}
