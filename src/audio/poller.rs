//! The polling loop itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use crate::api::RecognitionApi;
use crate::storage::MediaStore;

use super::{AudioPollHandle, AudioPollOptions, AudioPollUpdate};

/// Start polling for synthesized audio belonging to `session_id`.
///
/// Runs on its own thread; the returned handle is the only way to stop it
/// early. At most one poller should be live per session - callers starting
/// a new one must cancel the previous handle first, or both will download
/// and report the same file.
pub fn poll_audio(
    api: Arc<dyn RecognitionApi>,
    store: MediaStore,
    session_id: String,
    options: AudioPollOptions,
) -> AudioPollHandle {
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let flag = cancel_flag.clone();
    thread::spawn(move || run(api, store, session_id, options, flag, tx));

    AudioPollHandle::new(cancel_flag, rx)
}

fn run(
    api: Arc<dyn RecognitionApi>,
    store: MediaStore,
    session_id: String,
    options: AudioPollOptions,
    cancel: Arc<AtomicBool>,
    tx: mpsc::Sender<AudioPollUpdate>,
) {
    let start = Instant::now();

    loop {
        if sleep_cancellable(&cancel, options.interval) {
            tracing::debug!(session_id = %session_id, "audio poll cancelled");
            return;
        }

        match api.audio_status(&session_id) {
            Ok(Some(url)) => {
                match api.fetch_audio(&url).and_then(|bytes| store.save_audio(&bytes)) {
                    Ok(local_path) => {
                        tracing::info!(session_id = %session_id, path = %local_path.display(), "audio ready");
                        let _ = tx.send(AudioPollUpdate::Ready { local_path });
                        return;
                    }
                    Err(e) => {
                        // Download or write failed; the URL stays valid,
                        // so the next tick tries again.
                        tracing::warn!(session_id = %session_id, error = %e, "audio download failed");
                        let _ = tx.send(AudioPollUpdate::TickError {
                            error: e.to_string(),
                        });
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "audio status check failed");
                let _ = tx.send(AudioPollUpdate::TickError {
                    error: e.to_string(),
                });
            }
        }

        if start.elapsed() > options.timeout {
            tracing::warn!(session_id = %session_id, "audio polling timed out");
            let _ = tx.send(AudioPollUpdate::TimedOut);
            return;
        }
    }
}

/// Sleep for `duration` in short slices so cancellation takes effect
/// promptly. Returns true if the flag was raised.
fn sleep_cancellable(cancel: &AtomicBool, duration: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(10);

    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}
