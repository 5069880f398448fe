//! Notifications from the background threads to the consumer.
//!
//! Events travel over an unbounded tokio channel, which plain threads can send on
//! without a runtime. The receiving side can be drained synchronously (UI loops,
//! tests, the CLI) or awaited/streamed from async code.

use crate::watch::WatchOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Identifies one `start_search` run. Zero means "no search".
pub type SearchId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Columns are established; rows now decode into fields
    Configured,
    /// The visible row count changed
    RowCountChanged(u64),
    /// Matching rows of a search, ascending
    RowsFound { search: SearchId, rows: Vec<u64> },
    /// The watcher lost the file; all rows were dropped and it is reopening the path
    WatchInterrupted(WatchOutcome),
}

#[derive(Debug, Clone)]
pub(crate) struct EventSender {
    tx: UnboundedSender<EngineEvent>,
}

impl EventSender {
    /// Deliver an event; a consumer that dropped its receiver is not an error
    pub fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("Event receiver dropped");
        }
    }
}

/// Receiving side of an engine's notifications.
///
/// `RowsFound` batches of a search that has since been stopped or replaced are
/// discarded here, so a consumer only ever sees results of the current search.
#[derive(Debug)]
pub struct EngineEvents {
    rx: UnboundedReceiver<EngineEvent>,
    current_search: Arc<AtomicU64>,
}

pub(crate) fn channel(current_search: Arc<AtomicU64>) -> (EventSender, EngineEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EngineEvents { rx, current_search })
}

fn is_current(current_search: &AtomicU64, event: &EngineEvent) -> bool {
    match event {
        EngineEvent::RowsFound { search, .. } => *search == current_search.load(Ordering::Acquire),
        _ => true,
    }
}

impl EngineEvents {
    /// Next pending event, without waiting
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if is_current(&self.current_search, &event) {
                return Some(event);
            }
        }
        None
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<EngineEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }
    }

    /// Block the current thread until an event arrives. Returns `None` once the
    /// engine is gone. Must not be called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<EngineEvent> {
        loop {
            let event = self.rx.blocking_recv()?;
            if is_current(&self.current_search, &event) {
                return Some(event);
            }
        }
    }

    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            let event = self.rx.recv().await?;
            if is_current(&self.current_search, &event) {
                return Some(event);
            }
        }
    }

    /// Turn the receiver into an async stream of current events
    pub fn into_stream(self) -> impl Stream<Item = EngineEvent> {
        let current_search = self.current_search;
        UnboundedReceiverStream::new(self.rx)
            .filter(move |event| is_current(&current_search, event))
    }
}
