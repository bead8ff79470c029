use std::sync::Arc;

use crate::model::api::{
    account::{Credentials, Registration, SessionDescription},
    event::{EventDescription, EventSpec},
    id::ApiId,
    question::{QuestionDescription, QuestionSubmission},
};

use super::{push, Mutation, PushHandle, QnaApi, Result, SyncStore};

/// Everything the store can be asked to do.
#[derive(Clone)]
pub enum Command {
    SetEventId(ApiId),
    SetComputerId(String),
    /// Resolve a join code. The cache is left alone.
    FetchEventIdByCode(String),
    FetchEvent,
    /// Subscribe to the selected event's updates and fetch it.
    JoinEvent,
    SubmitQuestion {
        question: String,
        name: Option<String>,
    },
    Vote {
        question_id: ApiId,
        vote: bool,
    },
    WithdrawQuestion(ApiId),
    UpdateQuestions(Vec<QuestionDescription>),
    RegisterComputerId(String),
    RegisterUser(Registration),
    Login(Credentials),
    Logout,
    FetchSession,
    /// Create an event, then refresh the session so it lists the new event.
    CreateEvent(EventSpec),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetEventId(_) => "set event id",
            Self::SetComputerId(_) => "set computer id",
            Self::FetchEventIdByCode(_) => "fetch event id by code",
            Self::FetchEvent => "fetch event",
            Self::JoinEvent => "join event",
            Self::SubmitQuestion { .. } => "submit question",
            Self::Vote { .. } => "vote",
            Self::WithdrawQuestion(_) => "withdraw question",
            Self::UpdateQuestions(_) => "update questions",
            Self::RegisterComputerId(_) => "register computer id",
            Self::RegisterUser(_) => "register user",
            Self::Login(_) => "login",
            Self::Logout => "logout",
            Self::FetchSession => "fetch session",
            Self::CreateEvent(_) => "create event",
        }
    }
}

/// What a command produced.
pub enum Reply {
    Done,
    EventId(ApiId),
    Event(EventDescription),
    Question(QuestionDescription),
    Session(Option<SessionDescription>),
    /// Hold on to this for as long as updates should keep arriving.
    Joined(PushHandle),
}

impl<A: QnaApi> SyncStore<A> {
    /// Run a command. Errors are returned unchanged; nothing is retried.
    ///
    /// Mutating commands don't apply their own responses. Their effect
    /// reaches the cache through the push channel's re-fetch.
    pub async fn dispatch(self: &Arc<Self>, command: Command) -> Result<Reply> {
        trace!("Dispatching {}", command.name());
        match command {
            Command::SetEventId(event_id) => {
                self.commit(Mutation::SetEventId(event_id));
                Ok(Reply::Done)
            }
            Command::SetComputerId(computer_id) => {
                self.commit(Mutation::SetComputerId(computer_id));
                Ok(Reply::Done)
            }
            Command::FetchEventIdByCode(code) => {
                let event_id = self.api().event_id_by_code(&code).await?;
                Ok(Reply::EventId(event_id))
            }
            Command::FetchEvent => {
                let event = self.fetch_event(self.event_id()?).await?;
                Ok(Reply::Event(event))
            }
            Command::JoinEvent => {
                let event_id = self.event_id()?;
                let slot = self.connection_slot();
                let claim = slot.claim();
                let task =
                    rocket::tokio::spawn(push::maintain(Arc::clone(self), event_id, claim));
                let handle = PushHandle::new(task, slot, claim);
                self.fetch_event(event_id).await?;
                Ok(Reply::Joined(handle))
            }
            Command::SubmitQuestion { question, name } => {
                let event_id = self.event_id()?;
                let _loading = self.loading();
                let submission = QuestionSubmission {
                    text: question,
                    user: name,
                };
                let question = self.api().submit_question(event_id, &submission).await?;
                Ok(Reply::Question(question))
            }
            Command::Vote { question_id, vote } => {
                let event_id = self.event_id()?;
                let _loading = self.loading();
                let question = self.api().vote(event_id, question_id, vote).await?;
                Ok(Reply::Question(question))
            }
            Command::WithdrawQuestion(question_id) => {
                let event_id = self.event_id()?;
                self.api().withdraw_question(event_id, question_id).await?;
                Ok(Reply::Done)
            }
            Command::UpdateQuestions(questions) => {
                self.commit(Mutation::SetQuestions(questions));
                Ok(Reply::Done)
            }
            Command::RegisterComputerId(computer_id) => {
                self.commit(Mutation::SetComputerId(computer_id.clone()));
                self.api().register_device(&computer_id).await?;
                Ok(Reply::Done)
            }
            Command::RegisterUser(registration) => {
                let user = self.api().register_account(&registration).await?;
                self.commit(Mutation::SetUser(Some(user.clone())));
                Ok(Reply::Session(Some(user)))
            }
            Command::Login(credentials) => {
                let user = self.api().login(&credentials).await?;
                self.commit(Mutation::SetUser(Some(user.clone())));
                Ok(Reply::Session(Some(user)))
            }
            Command::Logout => {
                self.api().logout().await?;
                self.commit(Mutation::SetUser(None));
                Ok(Reply::Session(None))
            }
            Command::FetchSession => {
                let user = self.fetch_session().await?;
                Ok(Reply::Session(user))
            }
            Command::CreateEvent(spec) => {
                let event = self.api().create_event(&spec).await?;
                self.fetch_session().await?;
                Ok(Reply::Event(event))
            }
        }
    }

    async fn fetch_session(&self) -> Result<Option<SessionDescription>> {
        let user = self.api().session().await?;
        self.commit(Mutation::SetUser(user.clone()));
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use rocket::futures::SinkExt;

    use super::super::{
        fake::{eventually, FakeApi},
        ClientCache, ConnectionState, Error, Notice,
    };
    use super::*;

    fn store() -> Arc<SyncStore<FakeApi>> {
        Arc::new(SyncStore::new(FakeApi::new()))
    }

    /// A store with the fake's event selected.
    fn store_with_event() -> Arc<SyncStore<FakeApi>> {
        let store = store();
        store.commit(Mutation::SetEventId(store.api().event_id()));
        store
    }

    fn submission() -> Command {
        Command::SubmitQuestion {
            question: "What time is lunch?".to_string(),
            name: None,
        }
    }

    #[rocket::async_test]
    async fn loading_cleared_after_success() {
        let store = store_with_event();
        let changes = store.watch();

        store.dispatch(submission()).await.unwrap();
        assert!(!store.cache().loading);
        // The flag was raised, then lowered again.
        assert!(changes.has_changed().unwrap());

        let question_id = store.api().event.lock().unwrap().questions[0].id;
        store
            .dispatch(Command::Vote {
                question_id,
                vote: true,
            })
            .await
            .unwrap();
        assert!(!store.cache().loading);
        assert_eq!(store.api().calls(), vec!["submit_question", "vote"]);
    }

    #[rocket::async_test]
    async fn loading_cleared_after_failure() {
        let store = store_with_event();
        store.api().fail_writes.store(true, Ordering::SeqCst);

        let err = store.dispatch(submission()).await.err().unwrap();
        assert!(matches!(err, Error::Status { status: 500, .. }));
        assert!(!store.cache().loading);

        let question_id = store.api().event.lock().unwrap().questions[0].id;
        let err = store
            .dispatch(Command::Vote {
                question_id,
                vote: false,
            })
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(500));
        assert!(!store.cache().loading);
    }

    #[rocket::async_test]
    async fn writes_wait_for_the_push_channel() {
        let store = store_with_event();
        store.dispatch(Command::FetchEvent).await.unwrap();
        let before = store.cache();

        store.dispatch(submission()).await.unwrap();
        let question_id = before.event.as_ref().unwrap().questions[1].id;
        store
            .dispatch(Command::WithdrawQuestion(question_id))
            .await
            .unwrap();

        let mut after = store.cache();
        after.loading = before.loading;
        assert_eq!(after, before);
    }

    #[rocket::async_test]
    async fn commands_need_an_event() {
        let store = store();
        for command in [Command::FetchEvent, Command::JoinEvent, submission()] {
            let err = store.dispatch(command).await.err().unwrap();
            assert!(matches!(err, Error::NoEvent));
        }
        assert!(!store.cache().loading);
        assert!(store.api().calls().is_empty());
    }

    #[rocket::async_test]
    async fn init_registers_then_loads_session() {
        let api = FakeApi::new();
        let session = SessionDescription {
            id: crate::model::mongodb::Id::new().into(),
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            events: Vec::new(),
        };
        *api.session.lock().unwrap() = Some(session.clone());

        let store = SyncStore::init(api, "f00dfeed".to_string()).await.unwrap();
        assert_eq!(store.api().calls(), vec!["register_device", "session"]);
        let cache = store.cache();
        assert_eq!(cache.computer_id.as_deref(), Some("f00dfeed"));
        assert_eq!(cache.user, Some(session));
    }

    #[rocket::async_test]
    async fn creating_an_event_reloads_the_session() {
        let store = store();
        let reply = store
            .dispatch(Command::CreateEvent(EventSpec {
                name: "Town hall".to_string(),
            }))
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Event(event) if event.name == "Town hall"));
        assert_eq!(store.api().calls(), vec!["create_event", "session"]);
    }

    #[rocket::async_test]
    async fn sessions() {
        let store = store();
        let registration = Registration {
            username: "carol".to_string(),
            password: "hunter2hunter2".to_string(),
            display_name: None,
        };
        store
            .dispatch(Command::RegisterUser(registration))
            .await
            .unwrap();
        assert_eq!(store.cache().user.unwrap().username, "carol");

        store.dispatch(Command::Logout).await.unwrap();
        assert_eq!(store.cache().user, None);

        let credentials = Credentials {
            username: "dave".to_string(),
            password: "correct horse".to_string(),
        };
        store.dispatch(Command::Login(credentials)).await.unwrap();
        assert_eq!(store.cache().user.unwrap().username, "dave");
    }

    #[rocket::async_test]
    async fn codes_resolve_without_touching_the_cache() {
        let store = store();
        let code = store.api().event.lock().unwrap().code.clone();
        let reply = store
            .dispatch(Command::FetchEventIdByCode(code))
            .await
            .unwrap();
        assert!(matches!(reply, Reply::EventId(id) if id == store.api().event_id()));
        assert_eq!(store.cache(), ClientCache::default());

        let err = store
            .dispatch(Command::FetchEventIdByCode("NOPE99".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(404));
    }

    #[rocket::async_test]
    async fn update_questions_replaces_only_questions() {
        let store = store_with_event();
        store.dispatch(Command::FetchEvent).await.unwrap();
        let before = store.cache().event.unwrap();

        store
            .dispatch(Command::UpdateQuestions(Vec::new()))
            .await
            .unwrap();
        let after = store.cache().event.unwrap();
        assert!(after.questions.is_empty());
        assert_eq!(after.name, before.name);
        assert_eq!(after.id, before.id);
    }

    #[rocket::async_test]
    async fn notices_replace_the_event() {
        let store = store_with_event();
        let mut notices = store.api().accept_subscription();

        let reply = store.dispatch(Command::JoinEvent).await.unwrap();
        let Reply::Joined(_handle) = reply else {
            panic!("joining should hand back a push handle");
        };
        let original = store.cache().event.unwrap();
        let mut connection = store.connection();
        eventually("subscription", || {
            *connection.borrow_and_update() == ConnectionState::Subscribed
        })
        .await;

        let mut updated = original.clone();
        updated.questions.pop();
        updated.questions[0].votes = 42;
        *store.api().event.lock().unwrap() = updated.clone();

        notices.send(Ok(Notice::QuestionsUpdated)).await.unwrap();
        eventually("re-fetch", || store.cache().event.as_ref() == Some(&updated)).await;

        // Notices never reload the session.
        assert_eq!(store.api().count("session"), 0);
        assert_eq!(store.api().count("event"), 2);
    }

    #[rocket::async_test]
    async fn last_resolving_fetch_wins() {
        let store = store_with_event();
        let first = store.api().hold_next_fetch();
        let second = store.api().hold_next_fetch();

        let fetches: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                rocket::tokio::spawn(async move { store.dispatch(Command::FetchEvent).await })
            })
            .collect();
        eventually("both fetches to start", || store.api().count("event") == 2).await;

        let mut early = store.api().event.lock().unwrap().clone();
        early.name = "resolved first".to_string();
        let mut late = early.clone();
        late.name = "resolved last".to_string();

        second.send(early.clone()).unwrap();
        eventually("first resolution", || store.cache().event.as_ref() == Some(&early)).await;
        first.send(late.clone()).unwrap();

        for fetch in fetches {
            assert!(fetch.await.unwrap().is_ok());
        }
        assert_eq!(store.cache().event, Some(late));
    }
}
