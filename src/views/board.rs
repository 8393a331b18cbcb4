use std::sync::Arc;

use tokio::sync::{broadcast::{self, error::TryRecvError}, Mutex};

use crate::{
    feed::{Change, ChangeFeed},
    model::{Event, EventOrder},
    store::EventRepository,
    PortalError,
};

struct BoardState {
    rx: broadcast::Receiver<Change>,
    events: Vec<Event>,
    stale: bool,
}

/// The upcoming-events list students see, refetched whenever the change
/// feed reports an event or registration change.
#[derive(Clone)]
pub struct EventBoard {
    inner: Arc<Mutex<BoardState>>,
}

impl EventBoard {
    pub fn subscribe(feed: &ChangeFeed) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoardState {
                rx: feed.subscribe(),
                events: Vec::new(),
                stale: true,
            })),
        }
    }

    /// Events in date order, refetched first if anything changed since the
    /// last call.
    pub async fn snapshot(&self, events: &EventRepository) -> Result<Vec<Event>, PortalError> {
        let mut board = self.inner.lock().await;

        loop {
            match board.rx.try_recv() {
                Ok(change) if change.touches_events() => board.stale = true,
                Ok(_) => {},
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event board lagged behind the feed");
                    board.stale = true;
                },
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        if board.stale {
            board.events = events.list(EventOrder::Ascending, None).await?;
            board.stale = false;
        }
        Ok(board.events.clone())
    }
}
