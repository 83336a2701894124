//! Audio polling reconciler.
//!
//! Speech synthesis happens server-side and finishes some time after the
//! recognition response. The poller checks the audio-status endpoint on a
//! fixed interval, downloads the file into the media store once a URL
//! appears, and gives up at the timeout boundary. Tick-level network errors
//! are reported but do not stop polling; the next tick retries.

pub mod poller;

pub use poller::poll_audio;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::config::AudioConfig;

#[derive(Debug, Clone, Copy)]
pub struct AudioPollOptions {
    /// Time between status checks; the first check happens one interval in.
    pub interval: Duration,
    /// Give up once this much time has elapsed.
    pub timeout: Duration,
}

impl Default for AudioPollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

impl AudioPollOptions {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }
}

/// Updates sent from the polling thread.
#[derive(Debug, Clone)]
pub enum AudioPollUpdate {
    /// Audio was downloaded into the media store; polling has stopped.
    Ready { local_path: PathBuf },
    /// One tick failed (network or storage); polling continues.
    TickError { error: String },
    /// The timeout boundary passed without audio; polling has stopped.
    TimedOut,
}

/// Terminal state of one polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded(PathBuf),
    TimedOut,
    Cancelled,
}

/// Caller's grip on a running poller. Dropping the handle does not stop
/// the thread; call [`AudioPollHandle::cancel`] when the owning context
/// goes away, or a stale poller keeps hitting the network.
pub struct AudioPollHandle {
    cancel_flag: Arc<AtomicBool>,
    receiver: mpsc::Receiver<AudioPollUpdate>,
}

impl AudioPollHandle {
    pub(crate) fn new(
        cancel_flag: Arc<AtomicBool>,
        receiver: mpsc::Receiver<AudioPollUpdate>,
    ) -> Self {
        Self {
            cancel_flag,
            receiver,
        }
    }

    /// Stop the poller. Cancelling before the first tick prevents any
    /// network call from happening.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    /// Non-blocking check for the next update.
    pub fn try_update(&self) -> Option<AudioPollUpdate> {
        self.receiver.try_recv().ok()
    }

    /// Block until the poller reaches a terminal state. Tick errors are
    /// logged and skipped; a closed channel means the run was cancelled.
    pub fn wait(self) -> PollOutcome {
        loop {
            match self.receiver.recv() {
                Ok(AudioPollUpdate::Ready { local_path }) => {
                    return PollOutcome::Succeeded(local_path)
                }
                Ok(AudioPollUpdate::TimedOut) => return PollOutcome::TimedOut,
                Ok(AudioPollUpdate::TickError { error }) => {
                    tracing::debug!(error = %error, "audio poll tick failed, retrying");
                }
                Err(_) => return PollOutcome::Cancelled,
            }
        }
    }
}
