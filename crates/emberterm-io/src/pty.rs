//! The pty surface.
//!
//! The IO loop only needs a byte duplex plus resize: [`PtyIo`] is that
//! contract. [`SystemPty`] backs it with `portable-pty` (a real pty and a
//! spawned child); [`loopback`] provides an in-memory duplex for tests so
//! the loop can be driven deterministically without a shell.

use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};

use portable_pty::{CommandBuilder, native_pty_system};

/// Terminal dimensions for resize propagation (TIOCSWINSZ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PtySize {
    pub rows: u16,
    pub cols: u16,
    pub pixel_width: u16,
    pub pixel_height: u16,
}

/// A byte-duplex pty endpoint.
///
/// The reader and writer halves are taken once each: the reader half moves
/// to the reader thread, the writer half stays on the IO loop.
pub trait PtyIo: Send {
    fn take_reader(&mut self) -> io::Result<Box<dyn Read + Send>>;
    fn take_writer(&mut self) -> io::Result<Box<dyn Write + Send>>;
    fn resize(&mut self, size: PtySize) -> io::Result<()>;
}

/// A real pty with a spawned child process.
pub struct SystemPty {
    master: Box<dyn portable_pty::MasterPty + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
}

impl std::fmt::Debug for SystemPty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPty")
            .field("child_pid", &self.child.process_id())
            .finish()
    }
}

impl SystemPty {
    /// Open a pty and spawn `cmd` on its slave side.
    pub fn spawn(cmd: CommandBuilder, size: PtySize) -> io::Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(portable_pty::PtySize {
                rows: size.rows,
                cols: size.cols,
                pixel_width: size.pixel_width,
                pixel_height: size.pixel_height,
            })
            .map_err(to_io_error)?;
        let child = pair.slave.spawn_command(cmd).map_err(to_io_error)?;
        Ok(Self {
            master: pair.master,
            child,
        })
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child.process_id()
    }
}

impl PtyIo for SystemPty {
    fn take_reader(&mut self) -> io::Result<Box<dyn Read + Send>> {
        self.master.try_clone_reader().map_err(to_io_error)
    }

    fn take_writer(&mut self) -> io::Result<Box<dyn Write + Send>> {
        self.master.take_writer().map_err(to_io_error)
    }

    fn resize(&mut self, size: PtySize) -> io::Result<()> {
        self.master
            .resize(portable_pty::PtySize {
                rows: size.rows,
                cols: size.cols,
                pixel_width: size.pixel_width,
                pixel_height: size.pixel_height,
            })
            .map_err(to_io_error)
    }
}

impl Drop for SystemPty {
    fn drop(&mut self) {
        // Best effort; the child may already be gone.
        let _ = self.child.kill();
    }
}

fn to_io_error<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::other(err.to_string())
}

// ── Loopback (test) pty ─────────────────────────────────────────────

/// In-memory pty: the loop side reads what the peer writes and vice versa.
/// Reads block until data or disconnect, like a real pty fd.
#[derive(Debug)]
pub struct LoopbackPty {
    reader: Option<ChannelReader>,
    writer: Option<ChannelWriter>,
    resizes: Sender<PtySize>,
}

/// The "child" side of a loopback pair, for tests to script.
#[derive(Debug)]
pub struct LoopbackPeer {
    pub input: Sender<Vec<u8>>,
    pub output: Receiver<Vec<u8>>,
    pub resizes: Receiver<PtySize>,
}

/// Create a loopback pty pair.
pub fn loopback() -> (LoopbackPty, LoopbackPeer) {
    let (input_tx, input_rx) = channel();
    let (output_tx, output_rx) = channel();
    let (resize_tx, resize_rx) = channel();
    (
        LoopbackPty {
            reader: Some(ChannelReader {
                rx: input_rx,
                pending: Vec::new(),
                pos: 0,
            }),
            writer: Some(ChannelWriter { tx: output_tx }),
            resizes: resize_tx,
        },
        LoopbackPeer {
            input: input_tx,
            output: output_rx,
            resizes: resize_rx,
        },
    )
}

impl PtyIo for LoopbackPty {
    fn take_reader(&mut self) -> io::Result<Box<dyn Read + Send>> {
        self.reader
            .take()
            .map(|r| Box::new(r) as Box<dyn Read + Send>)
            .ok_or_else(|| io::Error::other("reader already taken"))
    }

    fn take_writer(&mut self) -> io::Result<Box<dyn Write + Send>> {
        self.writer
            .take()
            .map(|w| Box::new(w) as Box<dyn Write + Send>)
            .ok_or_else(|| io::Error::other("writer already taken"))
    }

    fn resize(&mut self, size: PtySize) -> io::Result<()> {
        self.resizes
            .send(size)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }
}

#[derive(Debug)]
struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0), // peer closed: EOF
            }
            // Drain whatever else is ready to batch reads.
            loop {
                match self.rx.try_recv() {
                    Ok(chunk) => self.pending.extend_from_slice(&chunk),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Debug)]
struct ChannelWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_roundtrips_bytes() {
        let (mut pty, peer) = loopback();
        let mut reader = pty.take_reader().unwrap();
        let mut writer = pty.take_writer().unwrap();

        peer.input.send(b"hello".to_vec()).unwrap();
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        writer.write_all(b"reply").unwrap();
        assert_eq!(peer.output.recv().unwrap(), b"reply");
    }

    #[test]
    fn loopback_reports_eof_when_peer_drops() {
        let (mut pty, peer) = loopback();
        let mut reader = pty.take_reader().unwrap();
        drop(peer);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn loopback_records_resizes() {
        let (mut pty, peer) = loopback();
        let size = PtySize {
            rows: 50,
            cols: 132,
            pixel_width: 1000,
            pixel_height: 800,
        };
        pty.resize(size).unwrap();
        assert_eq!(peer.resizes.recv().unwrap(), size);
    }

    #[test]
    fn halves_can_only_be_taken_once() {
        let (mut pty, _peer) = loopback();
        assert!(pty.take_reader().is_ok());
        assert!(pty.take_reader().is_err());
    }
}
