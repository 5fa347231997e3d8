#![forbid(unsafe_code)]

//! IO thread for the emberterm engine.
//!
//! This crate owns the thread that sits between the pty and the terminal
//! model: it reads child-process output, drives the parser and stream
//! dispatcher under the shared terminal lock, queues writes back to the
//! pty, and signals the renderer when state changed.
//!
//! # Threads
//!
//! - A **reader** helper thread blocks on the pty read half and feeds the
//!   event channel in chunks.
//! - The **IO loop** thread drains that channel — which also carries the
//!   surface mailbox — applies bytes to the terminal, flushes writes, and
//!   raises the renderer [`Wakeup`].
//!
//! The surface thread talks to the loop through [`Mailbox`]; the renderer
//! shares the terminal via [`SharedTerminal`] and sleeps on the wakeup.

pub mod event_loop;
pub mod mailbox;
pub mod pty;
pub mod wakeup;
pub mod write_queue;

pub use event_loop::{IoConfig, IoThread, Mailbox, SharedTerminal};
pub use mailbox::{MAX_INLINE_WRITE, Msg, ViewportScroll};
pub use pty::{LoopbackPeer, LoopbackPty, PtyIo, PtySize, SystemPty, loopback};
pub use wakeup::Wakeup;
pub use write_queue::WriteQueue;

/// Failures surfaced by the IO layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The IO loop exited; the mailbox has no consumer.
    #[error("io loop is gone")]
    LoopGone,
    /// A non-blocking send found the mailbox full.
    #[error("mailbox full")]
    MailboxFull,
}
