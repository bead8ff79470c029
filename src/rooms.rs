//! Push notification rooms.
//!
//! Every event has a room. Anything that changes an event's questions calls
//! [`Rooms::notify`], and every client streaming that event's updates is told
//! to re-fetch. Notices carry no payload: the event snapshot is the source of
//! truth, never the notice.

use rocket::tokio::sync::broadcast::{self, error::RecvError};

use crate::model::mongodb::Id;

/// Name of the server-sent event emitted when an event's questions change.
pub const QUESTIONS_UPDATED: &str = "questions updated";

/// Number of undelivered notices a slow listener may fall behind by before it lags.
const DEFAULT_CAPACITY: usize = 256;

/// All rooms, backed by a single broadcast channel of event IDs.
pub struct Rooms {
    tx: broadcast::Sender<Id>,
}

impl Rooms {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Tell everyone in the event's room that its questions changed.
    /// Returns the number of listeners across all rooms that saw the notice.
    pub fn notify(&self, event_id: Id) -> usize {
        let listeners = self.tx.send(event_id).unwrap_or(0);
        trace!("Notified {listeners} listener(s) of changes to event {event_id}");
        listeners
    }

    /// Join the room for the given event.
    pub fn join(&self, event_id: Id) -> Room {
        Room {
            event_id,
            rx: self.tx.subscribe(),
        }
    }

    /// Number of open room memberships across all events.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Rooms {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Membership of a single event's room.
pub struct Room {
    event_id: Id,
    rx: broadcast::Receiver<Id>,
}

impl Room {
    pub fn event_id(&self) -> Id {
        self.event_id
    }

    /// Wait for the next notice addressed to this room.
    /// Returns `None` once the rooms have been torn down.
    ///
    /// A listener that lagged behind may have missed notices for its own room,
    /// so lagging is reported as a single notice.
    pub async fn recv(&mut self) -> Option<()> {
        loop {
            match self.rx.recv().await {
                Ok(event_id) if event_id == self.event_id => return Some(()),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    debug!(
                        "Room for event {} lagged by {missed} notice(s)",
                        self.event_id
                    );
                    return Some(());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
