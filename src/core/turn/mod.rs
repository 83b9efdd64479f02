//! Turn-end detection over a stream of interim and final transcripts.
//!
//! Recognizers emit a trickle of interim hypotheses while the caller is still
//! speaking. A short debounce window turns that trickle into a single
//! utterance event: each interim restarts the window, and a final transcript
//! fires immediately, preempting any pending window.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

/// Callback invoked once per detected utterance
pub type UtteranceCallback =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Debounced utterance boundary detector.
///
/// Invariant: each utterance produces exactly one callback invocation, with
/// the final transcript winning over any interim still in flight.
pub struct TurnEndDetector {
    debounce: Duration,
    generation: Arc<AtomicU64>,
    last_transcript: Arc<Mutex<String>>,
    pending: Mutex<Option<tokio::task::JoinHandle<()>>>,
    callback: UtteranceCallback,
}

impl TurnEndDetector {
    pub fn new(debounce: Duration, callback: UtteranceCallback) -> Self {
        Self {
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            last_transcript: Arc::new(Mutex::new(String::new())),
            pending: Mutex::new(None),
            callback,
        }
    }

    /// Record an interim transcript and restart the debounce window
    pub fn on_interim(&self, transcript: &str) {
        if transcript.is_empty() {
            return;
        }
        *self.last_transcript.lock() = transcript.to_string();

        // The bump invalidates any window already sleeping
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let gen_handle = self.generation.clone();
        let last_transcript = self.last_transcript.clone();
        let callback = self.callback.clone();
        let debounce = self.debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if gen_handle.load(Ordering::Acquire) != generation {
                return;
            }
            let utterance = std::mem::take(&mut *last_transcript.lock());
            if !utterance.is_empty() {
                debug!("Turn ended by debounce: {:?}", utterance);
                callback(utterance).await;
            }
        });

        if let Some(previous) = self.pending.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Deliver a final transcript immediately, preempting any pending window
    pub async fn on_final(&self, transcript: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
        self.last_transcript.lock().clear();

        if transcript.is_empty() {
            return;
        }
        debug!("Turn ended by final transcript: {:?}", transcript);
        (self.callback)(transcript.to_string()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn channel_detector(debounce_ms: u64) -> (TurnEndDetector, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let detector = TurnEndDetector::new(
            Duration::from_millis(debounce_ms),
            Arc::new(move |utterance| {
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx.send(utterance);
                })
            }),
        );
        (detector, rx)
    }

    #[tokio::test]
    async fn test_interims_collapse_to_one_utterance() {
        let (detector, mut rx) = channel_detector(30);

        detector.on_interim("what");
        tokio::time::sleep(Duration::from_millis(10)).await;
        detector.on_interim("what are");
        tokio::time::sleep(Duration::from_millis(10)).await;
        detector.on_interim("what are your hours");

        let utterance = rx.recv().await.unwrap();
        assert_eq!(utterance, "what are your hours");

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_final_preempts_pending_window() {
        let (detector, mut rx) = channel_detector(50);

        detector.on_interim("what are your");
        detector.on_final("what are your hours?").await;

        let utterance = rx.recv().await.unwrap();
        assert_eq!(utterance, "what are your hours?");

        // the debounce window must not fire a second utterance
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_transcripts_ignored() {
        let (detector, mut rx) = channel_detector(10);

        detector.on_interim("");
        detector.on_final("").await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }
}
