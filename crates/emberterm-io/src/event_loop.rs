//! The IO thread: pty ↔ parser ↔ terminal.
//!
//! One OS thread runs a cooperative loop over a single bounded channel
//! carrying both pty-reader events and surface mailbox messages. A helper
//! thread blocks on the pty read half and feeds the channel in chunks, so
//! the loop itself only ever suspends on channel receive.
//!
//! Per iteration the loop drains pending events (coalescing redundant
//! resizes), applies pty bytes to the parser under the shared terminal
//! lock — in bounded chunks so the renderer is never starved — flushes the
//! write queue, and raises the renderer wakeup. Wakeups are withheld while
//! DEC 2026 (synchronized update) is active, with a timeout so a stuck
//! application cannot freeze the display.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use emberterm_core::{
    HandlerConfig, Modes, Parser, StreamHandler, StreamState, SurfaceEvent, Terminal,
};

use crate::Error;
use crate::mailbox::{Msg, ViewportScroll};
use crate::pty::{PtyIo, PtySize};
use crate::wakeup::Wakeup;
use crate::write_queue::WriteQueue;

/// The terminal shared between the IO thread and the renderer.
pub type SharedTerminal = Arc<Mutex<Terminal>>;

/// Tunables for the loop.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Event channel capacity (mailbox + reader chunks).
    pub mailbox_capacity: usize,
    /// Pty read chunk size.
    pub read_chunk: usize,
    /// Max bytes parsed per lock acquisition; larger batches release and
    /// reacquire between chunks to bound lock hold times.
    pub lock_batch: usize,
    /// How long a synchronized-update (DEC 2026) batch may withhold
    /// renderer wakeups.
    pub sync_timeout: Duration,
    /// Stream handler policy.
    pub handler: HandlerConfig,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
            read_chunk: 8192,
            lock_batch: 64 * 1024,
            sync_timeout: Duration::from_millis(150),
            handler: HandlerConfig::default(),
        }
    }
}

#[derive(Debug)]
enum Event {
    Control(Msg),
    PtyData(Vec<u8>),
    PtyEof,
    PtyError(std::io::Error),
    /// Internal: wake a blocked receive so the stop flag is observed.
    Stop,
}

/// Producer handle for the surface thread.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: SyncSender<Event>,
}

impl Mailbox {
    /// Send a control message, blocking briefly if the loop is behind.
    pub fn send(&self, msg: Msg) -> Result<(), Error> {
        self.tx
            .send(Event::Control(msg))
            .map_err(|_| Error::LoopGone)
    }

    /// Send without blocking; low-priority messages can be dropped when
    /// the mailbox is full.
    pub fn try_send(&self, msg: Msg) -> Result<(), Error> {
        match self.tx.try_send(Event::Control(msg)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::MailboxFull),
            Err(TrySendError::Disconnected(_)) => Err(Error::LoopGone),
        }
    }
}

/// A running IO thread.
#[derive(Debug)]
pub struct IoThread {
    mailbox: Mailbox,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl IoThread {
    /// Spawn the reader thread and the IO loop over `pty`.
    ///
    /// `surface_tx` receives out-of-band events (bell, title, clipboard);
    /// `wakeup` is raised whenever the terminal changed.
    pub fn spawn(
        mut pty: Box<dyn PtyIo>,
        terminal: SharedTerminal,
        wakeup: Arc<Wakeup>,
        surface_tx: mpsc::Sender<SurfaceEvent>,
        config: IoConfig,
    ) -> Result<Self, Error> {
        let (tx, rx) = sync_channel(config.mailbox_capacity);
        let stop = Arc::new(AtomicBool::new(false));

        let reader = pty.take_reader()?;
        let reader_tx = tx.clone();
        let read_chunk = config.read_chunk;
        thread::Builder::new()
            .name("emberterm-pty-read".into())
            .spawn(move || reader_main(reader, reader_tx, read_chunk))
            .map_err(Error::Io)?;

        let writer = pty.take_writer()?;
        let loop_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("emberterm-io".into())
            .spawn(move || {
                let mut state = LoopState {
                    pty,
                    writer,
                    terminal,
                    wakeup,
                    surface_tx,
                    config,
                    rx,
                    stop: loop_stop,
                    parser: Parser::new(),
                    stream: StreamState::default(),
                    writes: WriteQueue::new(),
                    pending_wakeup: false,
                    sync_deadline: None,
                };
                state.run();
            })
            .map_err(Error::Io)?;

        Ok(Self {
            mailbox: Mailbox { tx },
            stop,
            handle: Some(handle),
        })
    }

    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.clone()
    }

    /// Signal the loop to stop and wait for it to exit. The loop finishes
    /// only the message it already popped; the rest are dropped.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.mailbox.tx.try_send(Event::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IoThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.mailbox.tx.try_send(Event::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn reader_main(mut reader: Box<dyn Read + Send>, tx: SyncSender<Event>, chunk: usize) {
    let mut buf = vec![0u8; chunk.max(1)];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(Event::PtyEof);
                break;
            }
            Ok(n) => {
                if tx.send(Event::PtyData(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                // The fd is non-blocking on some hosts; back off and retry.
                thread::sleep(Duration::from_millis(1));
            }
            Err(err) => {
                let _ = tx.send(Event::PtyError(err));
                break;
            }
        }
    }
}

struct LoopState {
    pty: Box<dyn PtyIo>,
    writer: Box<dyn std::io::Write + Send>,
    terminal: SharedTerminal,
    wakeup: Arc<Wakeup>,
    surface_tx: mpsc::Sender<SurfaceEvent>,
    config: IoConfig,
    rx: Receiver<Event>,
    stop: Arc<AtomicBool>,
    parser: Parser,
    stream: StreamState,
    writes: WriteQueue,
    /// A mutation happened while DEC 2026 deferred the wakeup.
    pending_wakeup: bool,
    sync_deadline: Option<Instant>,
}

impl LoopState {
    fn run(&mut self) {
        tracing::debug!("io loop started");
        loop {
            if self.stop.load(Ordering::Acquire) {
                break;
            }

            let first = if let Some(deadline) = self.sync_deadline {
                match self
                    .rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => {
                        // A synchronized-update batch overran its budget.
                        self.flush_deferred_wakeup();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.rx.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                }
            };

            let mut batch: Vec<Event> = first.into_iter().collect();
            while batch.len() < self.config.mailbox_capacity {
                match self.rx.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(_) => break,
                }
            }
            coalesce_resizes(&mut batch);

            let mut mutated = false;
            let mut running = true;
            for event in batch {
                if self.stop.load(Ordering::Acquire) {
                    break;
                }
                match event {
                    Event::Control(msg) => mutated |= self.control(msg),
                    Event::PtyData(bytes) => {
                        self.parse_bytes(&bytes);
                        mutated = true;
                    }
                    Event::PtyEof => {
                        tracing::debug!("pty eof; io loop shutting down");
                        running = false;
                    }
                    Event::PtyError(err) => {
                        tracing::warn!(error = %err, "pty read failed");
                        running = false;
                    }
                    Event::Stop => {}
                }
            }

            if let Err(err) = self.writes.flush_to(&mut self.writer) {
                tracing::warn!(error = %err, "pty write failed");
            }

            if mutated {
                self.signal_renderer();
            }
            if !running {
                break;
            }
        }
        self.writes.clear();
        tracing::debug!("io loop exited");
    }

    /// Apply one control message. Returns whether the terminal changed.
    fn control(&mut self, msg: Msg) -> bool {
        match msg {
            Msg::Resize {
                rows,
                cols,
                pixel_width,
                pixel_height,
            } => {
                let size = PtySize {
                    rows,
                    cols,
                    pixel_width,
                    pixel_height,
                };
                if let Err(err) = self.pty.resize(size) {
                    tracing::warn!(error = %err, "pty resize failed");
                }
                let mut term = self.lock_terminal();
                term.resize(cols, rows, pixel_width, pixel_height);
                true
            }
            Msg::WriteSmall { buf, len } => {
                self.writes.push_small(buf, len);
                false
            }
            Msg::WriteStatic(slice) => {
                self.writes.push_static(slice);
                false
            }
            Msg::WriteOwned(vec) => {
                self.writes.push_owned(vec);
                false
            }
            Msg::ClearScreen => {
                let mut term = self.lock_terminal();
                term.erase_display(3, false);
                term.erase_display(2, false);
                term.cursor_goto(0, 0);
                true
            }
            Msg::ScrollViewport(scroll) => {
                let mut term = self.lock_terminal();
                let screen = term.screen_mut();
                match scroll {
                    ViewportScroll::Delta(delta) => screen.scroll_viewport(delta),
                    ViewportScroll::Top => screen.scroll_viewport_to_top(),
                    ViewportScroll::Bottom => screen.scroll_viewport_to_bottom(),
                }
                true
            }
            Msg::JumpToPrompt(delta) => {
                let mut term = self.lock_terminal();
                term.screen_mut().jump_to_prompt(delta);
                true
            }
            Msg::Inspector(enabled) => {
                tracing::debug!(enabled, "inspector toggled");
                false
            }
        }
    }

    /// Feed pty bytes through the parser under the terminal lock, in
    /// bounded chunks.
    fn parse_bytes(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(self.config.lock_batch.max(1)) {
            let mut replies = Vec::new();
            let mut events = Vec::new();
            {
                let mut term = Self::lock_terminal_handle(&self.terminal);
                let mut handler = StreamHandler {
                    term: &mut term,
                    replies: &mut replies,
                    events: &mut events,
                    state: &mut self.stream,
                    config: &self.config.handler,
                };
                self.parser.advance_slice(&mut handler, chunk);
            }
            if !replies.is_empty() {
                self.writes.push_owned(replies);
            }
            for event in events {
                let _ = self.surface_tx.send(event);
            }
        }
    }

    fn lock_terminal(&self) -> std::sync::MutexGuard<'_, Terminal> {
        Self::lock_terminal_handle(&self.terminal)
    }

    fn lock_terminal_handle(terminal: &SharedTerminal) -> std::sync::MutexGuard<'_, Terminal> {
        terminal.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raise the renderer wakeup unless a synchronized update defers it.
    fn signal_renderer(&mut self) {
        let synchronized = self
            .lock_terminal()
            .modes()
            .contains(Modes::SYNCHRONIZED);
        if synchronized {
            self.pending_wakeup = true;
            if self.sync_deadline.is_none() {
                self.sync_deadline = Some(Instant::now() + self.config.sync_timeout);
            }
        } else {
            self.pending_wakeup = false;
            self.sync_deadline = None;
            self.wakeup.raise();
        }
    }

    fn flush_deferred_wakeup(&mut self) {
        self.sync_deadline = None;
        if std::mem::take(&mut self.pending_wakeup) {
            tracing::trace!("synchronized update timed out; forcing redraw");
            self.wakeup.raise();
        }
    }
}

/// Drop control messages superseded by a later one in the same batch
/// ([`Msg::coalesces`] decides; today that is redundant resizes).
fn coalesce_resizes(batch: &mut Vec<Event>) {
    let superseded: Vec<bool> = batch
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let Event::Control(older) = event else {
                return false;
            };
            batch[i + 1..]
                .iter()
                .any(|later| matches!(later, Event::Control(newer) if older.coalesces(newer)))
        })
        .collect();
    let mut flags = superseded.into_iter();
    batch.retain(|_| !flags.next().unwrap_or(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::loopback;
    use std::time::Duration;

    struct Fixture {
        io: IoThread,
        terminal: SharedTerminal,
        wakeup: Arc<Wakeup>,
        peer: crate::pty::LoopbackPeer,
        surface_rx: mpsc::Receiver<SurfaceEvent>,
    }

    fn fixture(cols: u16, rows: u16) -> Fixture {
        let (pty, peer) = loopback();
        let terminal: SharedTerminal = Arc::new(Mutex::new(Terminal::new(cols, rows, 1000)));
        let wakeup = Arc::new(Wakeup::new());
        let (surface_tx, surface_rx) = mpsc::channel();
        let io = IoThread::spawn(
            Box::new(pty),
            Arc::clone(&terminal),
            Arc::clone(&wakeup),
            surface_tx,
            IoConfig::default(),
        )
        .expect("spawn io thread");
        Fixture {
            io,
            terminal,
            wakeup,
            peer,
            surface_rx,
        }
    }

    fn wait_for_wakeup(fx: &Fixture) {
        assert!(
            fx.wakeup.wait_timeout(Duration::from_secs(5)),
            "renderer wakeup never raised"
        );
    }

    #[test]
    fn pty_bytes_reach_the_grid() {
        let fx = fixture(20, 5);
        fx.peer.input.send(b"hello".to_vec()).unwrap();
        wait_for_wakeup(&fx);
        let term = fx.terminal.lock().unwrap();
        assert_eq!(term.screen().row(0).unwrap().text(), "hello");
        drop(term);
        fx.io.stop();
    }

    #[test]
    fn responses_flow_back_to_the_pty() {
        let fx = fixture(20, 5);
        fx.peer.input.send(b"\x1b[6n".to_vec()).unwrap();
        wait_for_wakeup(&fx);
        let reply = fx
            .peer
            .output
            .recv_timeout(Duration::from_secs(5))
            .expect("cursor position report");
        assert_eq!(reply, b"\x1b[1;1R");
        fx.io.stop();
    }

    #[test]
    fn mailbox_writes_reach_the_pty() {
        let fx = fixture(20, 5);
        fx.io.mailbox().send(Msg::write(b"ls\r")).unwrap();
        let written = fx
            .peer
            .output
            .recv_timeout(Duration::from_secs(5))
            .expect("queued write");
        assert_eq!(written, b"ls\r");
        fx.io.stop();
    }

    #[test]
    fn resize_propagates_to_pty_and_terminal() {
        let fx = fixture(20, 5);
        fx.io
            .mailbox()
            .send(Msg::Resize {
                rows: 10,
                cols: 40,
                pixel_width: 640,
                pixel_height: 480,
            })
            .unwrap();
        let size = fx
            .peer
            .resizes
            .recv_timeout(Duration::from_secs(5))
            .expect("pty resize");
        assert_eq!((size.rows, size.cols), (10, 40));
        wait_for_wakeup(&fx);
        let term = fx.terminal.lock().unwrap();
        assert_eq!((term.rows(), term.cols()), (10, 40));
        drop(term);
        fx.io.stop();
    }

    #[test]
    fn bell_reaches_the_surface() {
        let fx = fixture(20, 5);
        fx.peer.input.send(b"ding\x07".to_vec()).unwrap();
        let event = fx
            .surface_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("surface event");
        assert_eq!(event, SurfaceEvent::Bell);
        fx.io.stop();
    }

    #[test]
    fn eof_shuts_the_loop_down_cleanly() {
        let fx = fixture(20, 5);
        fx.peer.input.send(b"last words".to_vec()).unwrap();
        wait_for_wakeup(&fx);
        drop(fx.peer); // EOF
        fx.io.stop();
        // Final state survives for the renderer.
        let term = fx.terminal.lock().unwrap();
        assert_eq!(term.screen().row(0).unwrap().text(), "last words");
    }

    #[test]
    fn synchronized_update_defers_wakeup_until_reset() {
        let fx = fixture(20, 5);
        fx.peer
            .input
            .send(b"\x1b[?2026hhidden".to_vec())
            .unwrap();
        // The wakeup is withheld while 2026 is set.
        assert!(!fx.wakeup.wait_timeout(Duration::from_millis(50)));
        fx.peer.input.send(b"\x1b[?2026l".to_vec()).unwrap();
        wait_for_wakeup(&fx);
        let term = fx.terminal.lock().unwrap();
        assert_eq!(term.screen().row(0).unwrap().text(), "hidden");
        drop(term);
        fx.io.stop();
    }

    #[test]
    fn clear_screen_message_wipes_grid_and_history() {
        let fx = fixture(10, 2);
        fx.peer.input.send(b"a\r\nb\r\nc".to_vec()).unwrap();
        wait_for_wakeup(&fx);
        fx.io.mailbox().send(Msg::ClearScreen).unwrap();
        wait_for_wakeup(&fx);
        let term = fx.terminal.lock().unwrap();
        assert_eq!(term.primary_screen().history().len(), 0);
        assert_eq!(term.screen().row(0).unwrap().text(), "");
        drop(term);
        fx.io.stop();
    }

    #[test]
    fn stop_drops_pending_messages() {
        let fx = fixture(10, 2);
        let mailbox = fx.io.mailbox();
        fx.io.stop();
        // The loop is gone; sends fail rather than hang.
        assert!(matches!(
            mailbox.send(Msg::ClearScreen),
            Err(Error::LoopGone)
        ));
    }

    #[test]
    fn coalesce_keeps_only_newest_resize() {
        let mut batch = vec![
            Event::Control(Msg::Resize {
                rows: 1,
                cols: 1,
                pixel_width: 0,
                pixel_height: 0,
            }),
            Event::Control(Msg::ClearScreen),
            Event::Control(Msg::Resize {
                rows: 9,
                cols: 9,
                pixel_width: 0,
                pixel_height: 0,
            }),
        ];
        coalesce_resizes(&mut batch);
        assert_eq!(batch.len(), 2);
        assert!(matches!(
            batch[1],
            Event::Control(Msg::Resize { rows: 9, cols: 9, .. })
        ));
    }
}
