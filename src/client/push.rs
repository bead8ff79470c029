use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use rocket::{
    futures::StreamExt,
    tokio::{sync::watch, task::JoinHandle, time::sleep},
};
use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

use super::{api::Notice, QnaApi, SyncStore};

/// State of the push channel to the joined event's room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Trying to subscribe. `attempt` counts from 1 since the last success.
    Connecting { attempt: u32 },
    Subscribed,
}

/// Exponential backoff between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Give up after this many reconnection attempts in a row. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 250,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given retry, counting from zero.
    pub fn delay(&self, retry: u32) -> Duration {
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(retry.min(16)));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    fn exhausted(&self, retries: u32) -> bool {
        self.max_attempts.map_or(false, |max| retries >= max)
    }
}

/// The store's view of its push channel.
///
/// Each join claims the slot. Writes carry the claim they were made under, and
/// a write from a stopped or superseded join is ignored, even from a task
/// still mid-poll when its handle dropped. Claims are only checked or changed
/// under the watch channel's lock.
pub(crate) struct ConnectionSlot {
    state: watch::Sender<ConnectionState>,
    owner: AtomicU64,
}

impl ConnectionSlot {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            owner: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Take the slot over from whichever join held it.
    pub(crate) fn claim(&self) -> u64 {
        let mut claim = 0;
        self.state.send_if_modified(|_| {
            claim = self.owner.fetch_add(1, Ordering::SeqCst) + 1;
            false
        });
        claim
    }

    /// Record `next` if `claim` still owns the slot.
    pub(crate) fn set(&self, claim: u64, next: ConnectionState) -> bool {
        let mut owned = false;
        self.state.send_if_modified(|state| {
            owned = self.owner.load(Ordering::SeqCst) == claim;
            if owned {
                *state = next;
            }
            owned
        });
        owned
    }

    /// Give the slot up, leaving it disconnected. A no-op once superseded.
    pub(crate) fn release(&self, claim: u64) {
        self.state.send_if_modified(|state| {
            let released = self
                .owner
                .compare_exchange(claim, claim + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            if released {
                *state = ConnectionState::Disconnected;
            }
            released
        });
    }
}

/// Keeps the push channel for one event alive. Dropping it disconnects.
pub struct PushHandle {
    task: JoinHandle<()>,
    slot: Arc<ConnectionSlot>,
    claim: u64,
}

impl PushHandle {
    pub(crate) fn new(task: JoinHandle<()>, slot: Arc<ConnectionSlot>, claim: u64) -> Self {
        Self { task, slot, claim }
    }

    /// Has the connection given up for good, or been taken over by a later join?
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Disconnect now.
    pub fn stop(self) {}
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.task.abort();
        self.slot.release(self.claim);
    }
}

/// Subscribe to `event_id`'s room and re-fetch the event on every notice,
/// reconnecting with backoff whenever the channel drops. Stops as soon as
/// `claim` no longer owns the store's connection state.
pub(crate) async fn maintain<A: QnaApi>(
    store: Arc<SyncStore<A>>,
    event_id: ApiId,
    claim: u64,
) {
    let policy = store.backoff().clone();
    let slot = store.connection_slot();
    let mut retries = 0;
    let mut subscribed_before = false;

    loop {
        let connecting = ConnectionState::Connecting {
            attempt: retries + 1,
        };
        if !slot.set(claim, connecting) {
            break;
        }
        match store.api().subscribe(event_id).await {
            Ok(mut notices) => {
                retries = 0;
                if !slot.set(claim, ConnectionState::Subscribed) {
                    break;
                }
                info!("Listening for updates to event {event_id}");

                // Anything could have happened while we were away.
                if subscribed_before {
                    store.refresh(event_id).await;
                }
                subscribed_before = true;

                while let Some(notice) = notices.next().await {
                    match notice {
                        Ok(Notice::QuestionsUpdated) => store.refresh(event_id).await,
                        Err(e) => {
                            warn!("Update stream for event {event_id} failed: {e}");
                            break;
                        }
                    }
                }
                info!("Update stream for event {event_id} closed");
            }
            Err(e) => warn!("Could not subscribe to event {event_id}: {e}"),
        }

        if policy.exhausted(retries) {
            error!("Giving up on updates for event {event_id} after {retries} attempt(s)");
            slot.release(claim);
            return;
        }
        let delay = policy.delay(retries);
        retries += 1;
        if !slot.set(claim, ConnectionState::Disconnected) {
            break;
        }
        debug!("Reconnecting to event {event_id} in {delay:?}");
        sleep(delay).await;
    }

    debug!("Updates for event {event_id} were taken over by a later join");
}
