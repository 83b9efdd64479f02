//! Priority-ordered playback queue.
//!
//! Agents finish in arbitrary order; playback must not. Every enqueue
//! re-sorts the queue by `(priority, order)` and a single drain loop plays
//! items to completion one at a time, so exactly one utterance is audible
//! regardless of how responses raced in.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use crate::core::agents::AgentResponse;

/// Fired synchronously on enqueue, independent of playback timing.
/// Used for live-transcript mirroring to observers.
pub type GeneralCallback = Arc<dyn Fn(&AgentResponse) + Send + Sync>;

/// Awaited to full completion for each item before the next one plays
pub type PlaybackCallback =
    Arc<dyn Fn(AgentResponse) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct QueuedResponse {
    response: AgentResponse,
    /// Insertion index, breaking ties deterministically
    seq: u64,
}

impl QueuedResponse {
    fn sort_key(&self) -> (crate::core::agents::ResponsePriority, u32, u64) {
        (self.response.priority, self.response.order, self.seq)
    }
}

pub struct PlaybackSequencer {
    queue: Mutex<Vec<QueuedResponse>>,
    next_seq: AtomicU64,
    is_processing: AtomicBool,
    settle: Duration,
    general_callbacks: RwLock<Vec<GeneralCallback>>,
    playback_callbacks: RwLock<Vec<PlaybackCallback>>,
}

impl PlaybackSequencer {
    pub fn new(settle: Duration) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            is_processing: AtomicBool::new(false),
            settle,
            general_callbacks: RwLock::new(Vec::new()),
            playback_callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn on_general(&self, callback: GeneralCallback) {
        self.general_callbacks.write().push(callback);
    }

    pub fn on_playback(&self, callback: PlaybackCallback) {
        self.playback_callbacks.write().push(callback);
    }

    /// Queue a response and drain if no drain loop is already running.
    ///
    /// Returns once the queue is empty when this call started the drain, or
    /// immediately when another drain loop already owns playback.
    pub async fn enqueue(&self, response: AgentResponse) {
        debug!(
            agent = %response.agent,
            priority = ?response.priority,
            order = response.order,
            "Queueing playback item"
        );

        for callback in self.general_callbacks.read().iter() {
            callback(&response);
        }

        {
            let mut queue = self.queue.lock();
            queue.push(QueuedResponse {
                response,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            });
            queue.sort_by_key(QueuedResponse::sort_key);
        }

        self.drain().await;
    }

    async fn drain(&self) {
        // only one drain loop at a time
        if self
            .is_processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        loop {
            let item = {
                let mut queue = self.queue.lock();
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            };

            let Some(item) = item else {
                self.is_processing.store(false, Ordering::Release);
                // an enqueue may have raced the release; re-take the guard
                // rather than lose its item
                let has_pending = !self.queue.lock().is_empty();
                if has_pending
                    && self
                        .is_processing
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    continue;
                }
                return;
            };

            debug!(agent = %item.response.agent, "Playing queued response");
            let callbacks: Vec<PlaybackCallback> =
                self.playback_callbacks.read().iter().cloned().collect();
            for callback in callbacks {
                callback(item.response.clone()).await;
            }

            if !self.settle.is_zero() {
                tokio::time::sleep(self.settle).await;
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Log-and-continue wrapper for fire-and-forget enqueues
    pub async fn try_enqueue(&self, response: AgentResponse) {
        if response.text.is_empty() && response.audio.is_none() {
            error!(agent = %response.agent, "Dropping empty playback item");
            return;
        }
        self.enqueue(response).await;
    }
}
