//! Change notifications emitted by the repositories.
//!
//! Views that cache documents subscribe here and refetch when something they
//! show has changed.

use tokio::sync::broadcast;

use crate::model::RegistrationState;

const CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Notice { id: String },
    Event { id: String },
    Registration {
        event_id: String,
        student_id: String,
        state: RegistrationState,
    },
}

impl Change {
    pub fn touches_events(&self) -> bool {
        matches!(self, Change::Event { .. } | Change::Registration { .. })
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new() -> ChangeFeed {
        ChangeFeed { tx: broadcast::channel(CAPACITY).0 }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, change: Change) {
        tracing::debug!(?change, "change");
        // nobody listening is fine
        let _ = self.tx.send(change);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_emitted_changes() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        feed.emit(Change::Event { id: "e1".into() });
        assert_eq!(rx.recv().await.unwrap(), Change::Event { id: "e1".into() });
    }

    #[test]
    fn emitting_without_subscribers_is_silent() {
        ChangeFeed::new().emit(Change::Notice { id: "n".into() });
    }
}
