//! Queued writes to the pty.
//!
//! Writes use non-blocking semantics: a partial write re-enqueues the
//! tail, `WouldBlock` leaves the queue intact for the next loop iteration,
//! and `Interrupted` retries immediately. Chunks mirror the mailbox write
//! variants so keystroke-sized writes never allocate.

use std::collections::VecDeque;
use std::io::{self, Write};

use crate::mailbox::MAX_INLINE_WRITE;

#[derive(Debug)]
enum Chunk {
    Small { buf: [u8; MAX_INLINE_WRITE], len: u8 },
    Static(&'static [u8]),
    Owned(Vec<u8>),
}

impl Chunk {
    fn bytes(&self) -> &[u8] {
        match self {
            Chunk::Small { buf, len } => &buf[..*len as usize],
            Chunk::Static(slice) => slice,
            Chunk::Owned(vec) => vec,
        }
    }
}

/// FIFO of pending pty writes.
#[derive(Debug, Default)]
pub struct WriteQueue {
    chunks: VecDeque<Chunk>,
    /// Bytes of the front chunk already written.
    front_written: usize,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Queued-but-unwritten byte count.
    pub fn pending_bytes(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.bytes().len())
            .sum::<usize>()
            - self.front_written
    }

    pub fn push_small(&mut self, buf: [u8; MAX_INLINE_WRITE], len: u8) {
        if len > 0 {
            self.chunks.push_back(Chunk::Small { buf, len });
        }
    }

    pub fn push_static(&mut self, slice: &'static [u8]) {
        if !slice.is_empty() {
            self.chunks.push_back(Chunk::Static(slice));
        }
    }

    pub fn push_owned(&mut self, vec: Vec<u8>) {
        if !vec.is_empty() {
            self.chunks.push_back(Chunk::Owned(vec));
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() <= MAX_INLINE_WRITE {
            let mut buf = [0u8; MAX_INLINE_WRITE];
            buf[..bytes.len()].copy_from_slice(bytes);
            self.push_small(buf, bytes.len() as u8);
        } else {
            self.push_owned(bytes.to_vec());
        }
    }

    /// Write as much as the sink accepts. Returns `Ok(true)` when the
    /// queue drained completely, `Ok(false)` when the sink would block.
    pub fn flush_to(&mut self, sink: &mut dyn Write) -> io::Result<bool> {
        while let Some(front) = self.chunks.front() {
            let bytes = &front.bytes()[self.front_written..];
            match sink.write(bytes) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "pty write returned zero",
                    ));
                }
                Ok(n) if n == bytes.len() => {
                    self.chunks.pop_front();
                    self.front_written = 0;
                }
                Ok(n) => {
                    // Partial write: keep the tail for the next round.
                    self.front_written += n;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        let _ = sink.flush();
        Ok(true)
    }

    /// Drop everything (loop shutdown): owned buffers are freed here.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.front_written = 0;
    }
}
