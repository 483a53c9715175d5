//! In-process byte pipe bridging a streaming producer and a blocking
//! consumer.
//!
//! One `ChannelWriter`, one `ChannelReader`, a bounded chunk channel in
//! between. The bound is the back-pressure: a producer that outruns the
//! consumer blocks instead of buffering the whole tree in memory. Dropping
//! the reader turns further writes into `BrokenPipe`; dropping the writer
//! drains as EOF.

use std::io::{self, Read, Write};
use std::sync::mpsc;

/// Number of chunks in flight
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;
/// Size of each chunk in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Create a linked writer/reader pair.
pub fn channel_pipe(channel_buffer: usize, chunk_size: usize) -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(channel_buffer);
    (ChannelWriter::new(tx, chunk_size), ChannelReader::new(rx))
}

/// Write half: buffers into fixed-size chunks and sends them downstream.
pub struct ChannelWriter {
    tx: mpsc::SyncSender<Vec<u8>>,
    buffer: Vec<u8>,
    chunk_size: usize,
}

impl ChannelWriter {
    fn new(tx: mpsc::SyncSender<Vec<u8>>, chunk_size: usize) -> Self {
        Self {
            tx,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
            self.tx
                .send(chunk)
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        }
        Ok(())
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        let mut remaining = buf;

        while !remaining.is_empty() {
            let available = self.chunk_size - self.buffer.len();
            let to_write = remaining.len().min(available);

            self.buffer.extend_from_slice(&remaining[..to_write]);
            written += to_write;
            remaining = &remaining[to_write..];

            if self.buffer.len() >= self.chunk_size {
                self.flush_buffer()?;
            }
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        let _ = self.flush_buffer();
    }
}

/// Read half: receives chunks and serves them out as a contiguous stream.
pub struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            buffer: Vec::new(),
            buffer_pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.buffer_pos < self.buffer.len() {
            let available = self.buffer.len() - self.buffer_pos;
            let to_copy = available.min(buf.len());
            buf[..to_copy]
                .copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + to_copy]);
            self.buffer_pos += to_copy;
            return Ok(to_copy);
        }

        match self.rx.recv() {
            Ok(chunk) => {
                if chunk.is_empty() {
                    return Ok(0);
                }

                self.buffer = chunk;
                self.buffer_pos = 0;

                let to_copy = self.buffer.len().min(buf.len());
                buf[..to_copy].copy_from_slice(&self.buffer[..to_copy]);
                self.buffer_pos = to_copy;
                Ok(to_copy)
            }
            Err(_) => Ok(0), // Channel closed, EOF
        }
    }
}
