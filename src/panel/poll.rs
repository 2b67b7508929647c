//! Fixed-interval repeating callback with deterministic cancellation.
//!
//! The worker thread waits on a stop channel with a timeout: a timeout is a
//! tick, a disconnect is a stop. The first tick lands one full interval after
//! `start`.

#![allow(missing_docs)]

use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

use crate::core::errors::{Result, UbpError};

pub struct PollScheduler;

impl PollScheduler {
    /// Invoke `callback` every `interval` on a dedicated thread until stopped.
    pub fn start<F>(mut callback: F, interval: Duration) -> Result<PollHandle>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let join = thread::Builder::new()
            .name("ubp-poll".to_string())
            .spawn(move || {
                while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                    callback();
                }
            })
            .map_err(|e| UbpError::Runtime {
                details: format!("failed to spawn poll thread: {e}"),
            })?;

        Ok(PollHandle {
            worker: join.thread().id(),
            stop_tx: Some(stop_tx),
            join: Some(join),
            interval,
        })
    }

    /// Equivalent to [`PollHandle::stop`].
    pub fn stop(handle: &mut PollHandle) {
        handle.stop();
    }
}

/// Owned token for one running schedule. Stops the schedule when dropped.
#[derive(Debug)]
pub struct PollHandle {
    worker: ThreadId,
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PollHandle {
    /// Stop the schedule. Idempotent.
    ///
    /// Once this returns the callback will not be invoked again. A call made
    /// from inside the callback does not wait for itself; the loop exits as
    /// soon as the callback returns.
    pub fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(join) = self.join.take() {
            if thread::current().id() == self.worker {
                return;
            }
            if join.join().is_err() {
                eprintln!("[UBP-PANEL] poll callback panicked");
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stop_tx.is_some()
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
