use crate::domain::Review;
use tokio::sync::mpsc::UnboundedSender;

/// Progress reported by a running scrape.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    Status(String),
    Loaded { count: usize, attempt: usize },
    Extracted(Review),
    Finished { count: usize },
}

/// Where a scrape sends its [`ScrapeEvent`]s. A closed or missing receiver
/// is not an error.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<UnboundedSender<ScrapeEvent>>,
}

impl Progress {
    pub fn new(tx: UnboundedSender<ScrapeEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ScrapeEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(ScrapeEvent::Status(message.into()));
    }
}
