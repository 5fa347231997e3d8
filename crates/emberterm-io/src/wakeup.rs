//! Level-triggered, coalesced wakeup signal.
//!
//! The IO thread raises it after applying terminal mutations; the renderer
//! thread waits on it between frames. Multiple raises before a wait
//! collapse into one — the renderer redraws current state, so the count
//! never matters.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Wakeup {
    raised: Mutex<bool>,
    condvar: Condvar,
}

impl Wakeup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent until consumed.
    pub fn raise(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());
        *raised = true;
        self.condvar.notify_all();
    }

    /// Consume the signal if raised.
    pub fn take(&self) -> bool {
        let mut raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *raised)
    }

    /// Block until raised, then consume.
    pub fn wait(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());
        while !*raised {
            raised = self.condvar.wait(raised).unwrap_or_else(|e| e.into_inner());
        }
        *raised = false;
    }

    /// Block until raised or the timeout elapses; returns whether the
    /// signal was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());
        if !*raised {
            let (guard, _result) = self
                .condvar
                .wait_timeout(raised, timeout)
                .unwrap_or_else(|e| e.into_inner());
            raised = guard;
        }
        std::mem::take(&mut *raised)
    }
}
