//! Progress events pushed to a consumer while a scrape runs.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{Departure, ScrapeResult};

/// One event in a scrape's output stream, serialized as
/// `{"type": "...", ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScrapeEvent {
    Status { message: String },
    Progress { current: usize, total: usize },
    Departure { departure: Departure },
    Complete { data: ScrapeResult },
    Error { message: String },
}

impl ScrapeEvent {
    /// Complete and error end a stream; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScrapeEvent::Complete { .. } | ScrapeEvent::Error { .. })
    }
}

/// Where a run sends its events.
///
/// A closed receiver does not stop the run; events are then dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<ScrapeEvent>>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ScrapeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink for callers that only want the final result.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub async fn emit(&self, event: ScrapeEvent) {
        if let Some(tx) = &self.tx {
            // The consumer may have gone away; the run carries on.
            let _ = tx.send(event).await;
        }
    }

    pub async fn status(&self, message: impl Into<String>) {
        self.emit(ScrapeEvent::Status {
            message: message.into(),
        })
        .await;
    }

    pub async fn progress(&self, current: usize, total: usize) {
        self.emit(ScrapeEvent::Progress { current, total }).await;
    }

    pub async fn departure(&self, departure: Departure) {
        self.emit(ScrapeEvent::Departure { departure }).await;
    }
}
