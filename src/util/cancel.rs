// src/util/cancel.rs

//! Cooperative cancellation
//!
//! A [`CancellationToken`] threads the full engine call graph. Chunked I/O
//! loops, the extraction loop and the post-command quiescence sleep all
//! observe it between units of work. Cloning the token is cheap and all
//! clones share the same state.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// A shared flag that signals cancellation of a deployment invocation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers cancellation and wakes any interruptible sleeps.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock().unwrap();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    /// Returns true if cancellation has been triggered.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().unwrap()
    }

    /// Returns a cancellation error if cancellation has been triggered.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for the given duration, waking early on cancellation.
    ///
    /// Returns true if the full duration elapsed and false if the sleep was
    /// interrupted by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = std::time::Instant::now() + duration;
        let mut cancelled = self.inner.cancelled.lock().unwrap();
        loop {
            if *cancelled {
                return false;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _) = self
                .inner
                .condvar
                .wait_timeout(cancelled, deadline - now)
                .unwrap();
            cancelled = guard;
        }
    }
}
