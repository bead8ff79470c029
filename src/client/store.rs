use std::sync::Arc;

use rocket::tokio::sync::watch;

use crate::model::api::{
    account::SessionDescription,
    event::EventDescription,
    id::ApiId,
    question::QuestionDescription,
};

use super::{
    push::{BackoffPolicy, ConnectionSlot, ConnectionState},
    Command, Error, QnaApi, Result,
};

/// The client's local view. Eventually consistent with the server and never
/// authoritative: `event` is replaced wholesale by every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCache {
    pub event_id: Option<ApiId>,
    pub event: Option<EventDescription>,
    pub computer_id: Option<String>,
    pub user: Option<SessionDescription>,
    pub loading: bool,
}

/// Every way the cache can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetEventId(ApiId),
    SetEvent(EventDescription),
    SetQuestions(Vec<QuestionDescription>),
    SetComputerId(String),
    SetUser(Option<SessionDescription>),
    SetLoading(bool),
}

/// Apply a mutation to the cache.
pub fn commit(cache: &mut ClientCache, mutation: Mutation) {
    match mutation {
        Mutation::SetEventId(event_id) => {
            if cache.event_id != Some(event_id) {
                cache.event = None;
            }
            cache.event_id = Some(event_id);
        }
        Mutation::SetEvent(event) => cache.event = Some(event),
        Mutation::SetQuestions(questions) => match cache.event.as_mut() {
            Some(event) => event.questions = questions,
            None => debug!("No event loaded, dropping {} question(s)", questions.len()),
        },
        Mutation::SetComputerId(computer_id) => cache.computer_id = Some(computer_id),
        Mutation::SetUser(user) => cache.user = user,
        Mutation::SetLoading(loading) => cache.loading = loading,
    }
}

/// The client's state container. Construct one at the application root and
/// share it by `Arc`.
pub struct SyncStore<A> {
    api: A,
    cache: watch::Sender<ClientCache>,
    connection: Arc<ConnectionSlot>,
    backoff: BackoffPolicy,
}

impl<A: QnaApi> SyncStore<A> {
    pub fn new(api: A) -> Self {
        Self::with_backoff(api, BackoffPolicy::default())
    }

    pub fn with_backoff(api: A, backoff: BackoffPolicy) -> Self {
        let (cache, _) = watch::channel(ClientCache::default());
        Self {
            api,
            cache,
            connection: Arc::new(ConnectionSlot::new()),
            backoff,
        }
    }

    /// Build a store with default backoff and bootstrap it.
    pub async fn init(api: A, computer_id: String) -> Result<Arc<Self>> {
        let store = Arc::new(Self::new(api));
        store.bootstrap(computer_id).await?;
        Ok(store)
    }

    /// Register the device, then load whatever session it already has.
    pub async fn bootstrap(self: &Arc<Self>, computer_id: String) -> Result<()> {
        self.dispatch(Command::RegisterComputerId(computer_id))
            .await?;
        self.dispatch(Command::FetchSession).await?;
        Ok(())
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// A copy of the current cache.
    pub fn cache(&self) -> ClientCache {
        self.cache.borrow().clone()
    }

    /// Watch the cache for changes.
    pub fn watch(&self) -> watch::Receiver<ClientCache> {
        self.cache.subscribe()
    }

    /// Watch the push channel's state.
    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn commit(&self, mutation: Mutation) {
        self.cache.send_modify(|cache| commit(cache, mutation));
    }

    pub(crate) fn connection_slot(&self) -> Arc<ConnectionSlot> {
        Arc::clone(&self.connection)
    }

    pub(crate) fn event_id(&self) -> Result<ApiId> {
        self.cache.borrow().event_id.ok_or(Error::NoEvent)
    }

    /// Mark the store as loading until the guard drops.
    pub(crate) fn loading(&self) -> LoadingGuard<'_> {
        self.commit(Mutation::SetLoading(true));
        LoadingGuard { cache: &self.cache }
    }

    /// Fetch the event and replace the cached snapshot with it, unless
    /// another event was selected in the meantime.
    pub(crate) async fn fetch_event(&self, event_id: ApiId) -> Result<EventDescription> {
        let event = self.api.event(event_id).await?;
        self.cache.send_modify(|cache| {
            if cache.event_id == Some(event_id) {
                commit(cache, Mutation::SetEvent(event.clone()));
            } else {
                debug!("Discarding snapshot of event {event_id}, no longer selected");
            }
        });
        Ok(event)
    }

    /// Re-fetch after a notice. Failures are only logged; the next notice retries.
    pub(crate) async fn refresh(&self, event_id: ApiId) {
        if let Err(e) = self.fetch_event(event_id).await {
            warn!("Could not refresh event {event_id}: {e}");
        }
    }
}

/// Clears the loading flag when dropped, however the command ended.
pub(crate) struct LoadingGuard<'a> {
    cache: &'a watch::Sender<ClientCache>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.cache
            .send_modify(|cache| commit(cache, Mutation::SetLoading(false)));
    }
}
