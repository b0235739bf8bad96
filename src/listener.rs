//! # Listener Module
//!
//! The crawl's only externally observable push interface.
//!
//! ## Overview
//!
//! All observable outcomes (progress, found URIs, per-task results, and
//! completion) are published as [`SpiderEvent`]s on a broadcast bus.
//! Subscribers receive their own channel, so subscription changes can never
//! race with delivery. Trait-object listeners are bridged onto the bus by a
//! forwarder task; no thread or ordering guarantee is made beyond the bus
//! itself, so implementations must be internally thread-safe.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use crate::filter::RejectReason;
use crate::resource::FetchedMessage;

/// How a found URI was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoundStatus {
    /// Registered as a crawl origin.
    Seed,
    /// Accepted by every fetch filter; a task was created.
    Accepted,
    /// Accepted but carrying a parser-level "do not fetch" hint.
    AcceptedNotFetched,
    /// Rejected by the first objecting fetch filter.
    Skipped(RejectReason),
}

/// Terminal outcome of one crawl task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Processed,
    /// Fetched (or attempted) but not expanded, with a non-empty reason.
    NotProcessed(String),
}

/// Result pushed for every task that produced a message.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub message: Arc<FetchedMessage>,
    pub outcome: TaskOutcome,
}

/// Events published during a crawl.
#[derive(Debug, Clone)]
pub enum SpiderEvent {
    Progress {
        percent: u8,
        done: u64,
        remaining: u64,
    },
    FoundUri {
        uri: String,
        method: String,
        status: FoundStatus,
    },
    TaskResult(TaskResult),
    Complete {
        successful: bool,
    },
}

/// Push listener contract; every method has a no-op default.
#[async_trait]
pub trait SpiderListener: Send + Sync {
    async fn on_progress(&self, _percent: u8, _done: u64, _remaining: u64) {}
    async fn on_found_uri(&self, _uri: &str, _method: &str, _status: &FoundStatus) {}
    async fn on_task_result(&self, _result: &TaskResult) {}
    async fn on_complete(&self, _successful: bool) {}
}

/// Broadcast fan-out for [`SpiderEvent`]s.
pub struct EventBus {
    tx: broadcast::Sender<SpiderEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    /// A fresh receiver; events emitted after this call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<SpiderEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Lack of subscribers is not an error.
    pub(crate) fn emit(&self, event: SpiderEvent) {
        trace!(?event, "emitting spider event");
        let _ = self.tx.send(event);
    }

    /// Bridges a trait-object listener onto the bus with a forwarder task.
    pub fn attach_listener(
        &self,
        listener: Arc<dyn SpiderListener>,
    ) -> tokio::task::JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(SpiderEvent::Progress {
                        percent,
                        done,
                        remaining,
                    }) => listener.on_progress(percent, done, remaining).await,
                    Ok(SpiderEvent::FoundUri {
                        uri,
                        method,
                        status,
                    }) => listener.on_found_uri(&uri, &method, &status).await,
                    Ok(SpiderEvent::TaskResult(result)) => listener.on_task_result(&result).await,
                    Ok(SpiderEvent::Complete { successful }) => {
                        listener.on_complete(successful).await
                    }
                    // A slow listener that lagged keeps receiving from the
                    // oldest retained event.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(SpiderEvent::Complete { successful: true });

        assert!(matches!(
            first.recv().await.unwrap(),
            SpiderEvent::Complete { successful: true }
        ));
        assert!(matches!(
            second.recv().await.unwrap(),
            SpiderEvent::Complete { successful: true }
        ));
    }

    #[tokio::test]
    async fn attached_listener_receives_events() {
        use std::sync::atomic::{AtomicU64, Ordering};

        #[derive(Default)]
        struct Recorder {
            completions: AtomicU64,
        }

        #[async_trait]
        impl SpiderListener for Recorder {
            async fn on_complete(&self, _successful: bool) {
                self.completions.fetch_add(1, Ordering::SeqCst);
            }
        }

        let bus = EventBus::new(16);
        let recorder = Arc::new(Recorder::default());
        let handle = bus.attach_listener(Arc::clone(&recorder) as Arc<dyn SpiderListener>);

        bus.emit(SpiderEvent::Complete { successful: false });
        drop(bus);
        handle.await.unwrap();

        assert_eq!(recorder.completions.load(Ordering::SeqCst), 1);
    }
}
