//! An in-memory [`QnaApi`] that records its calls.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};
use std::time::Duration;

use rocket::{
    futures::{
        channel::{mpsc, oneshot},
        StreamExt,
    },
    tokio::time::{sleep, timeout},
};

use crate::model::{
    api::{
        account::{Credentials, Registration, SessionDescription},
        event::{EventDescription, EventSpec},
        id::ApiId,
        question::{QuestionDescription, QuestionSubmission},
    },
    db::event::Event,
    mongodb::Id,
};

use super::{Error, Notice, NoticeStream, QnaApi, Result};

pub struct FakeApi {
    calls: Mutex<Vec<&'static str>>,
    /// What the server currently thinks the event looks like.
    pub event: Mutex<EventDescription>,
    held_fetches: Mutex<VecDeque<oneshot::Receiver<EventDescription>>>,
    pub session: Mutex<Option<SessionDescription>>,
    /// Make every write fail with a 500.
    pub fail_writes: AtomicBool,
    subscriptions: Mutex<VecDeque<Option<mpsc::UnboundedReceiver<Result<Notice>>>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            event: Mutex::new(Event::example(Id::new()).into()),
            held_fetches: Mutex::new(VecDeque::new()),
            session: Mutex::new(None),
            fail_writes: AtomicBool::new(false),
            subscriptions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn event_id(&self) -> ApiId {
        self.event.lock().unwrap().id
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    /// Hold the next event fetch until the returned sender resolves it.
    pub fn hold_next_fetch(&self) -> oneshot::Sender<EventDescription> {
        let (tx, rx) = oneshot::channel();
        self.held_fetches.lock().unwrap().push_back(rx);
        tx
    }

    /// Let the next subscription through, fed by the returned sender.
    /// Subscriptions nobody accepted are refused.
    pub fn accept_subscription(&self) -> mpsc::UnboundedSender<Result<Notice>> {
        let (tx, rx) = mpsc::unbounded();
        self.subscriptions.lock().unwrap().push_back(Some(rx));
        tx
    }

    /// Refuse the next subscription.
    pub fn refuse_subscription(&self) {
        self.subscriptions.lock().unwrap().push_back(None);
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn write(&self, call: &'static str) -> Result<()> {
        self.record(call);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::Status {
                status: 500,
                body: "boom".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn first_question(&self) -> QuestionDescription {
        self.event.lock().unwrap().questions[0].clone()
    }
}

#[rocket::async_trait]
impl QnaApi for FakeApi {
    async fn event_id_by_code(&self, code: &str) -> Result<ApiId> {
        self.record("event_id_by_code");
        let event = self.event.lock().unwrap().clone();
        if event.code == code {
            Ok(event.id)
        } else {
            Err(Error::Status {
                status: 404,
                body: String::new(),
            })
        }
    }

    async fn event(&self, _event_id: ApiId) -> Result<EventDescription> {
        self.record("event");
        let held = self.held_fetches.lock().unwrap().pop_front();
        match held {
            Some(rx) => rx.await.map_err(|_| Error::Decode("fetch abandoned".to_string())),
            None => Ok(self.event.lock().unwrap().clone()),
        }
    }

    async fn create_event(&self, spec: &EventSpec) -> Result<EventDescription> {
        self.write("create_event")?;
        let mut event = self.event.lock().unwrap().clone();
        event.name = spec.name.clone();
        Ok(event)
    }

    async fn submit_question(
        &self,
        _event_id: ApiId,
        _submission: &QuestionSubmission,
    ) -> Result<QuestionDescription> {
        self.write("submit_question")?;
        Ok(self.first_question())
    }

    async fn vote(
        &self,
        _event_id: ApiId,
        _question_id: ApiId,
        _vote: bool,
    ) -> Result<QuestionDescription> {
        self.write("vote")?;
        Ok(self.first_question())
    }

    async fn withdraw_question(&self, _event_id: ApiId, _question_id: ApiId) -> Result<()> {
        self.write("withdraw_question")
    }

    async fn register_device(&self, _computer_id: &str) -> Result<()> {
        self.write("register_device")
    }

    async fn register_account(&self, registration: &Registration) -> Result<SessionDescription> {
        self.write("register_account")?;
        let session = SessionDescription {
            id: Id::new().into(),
            username: registration.username.clone(),
            display_name: registration.username.clone(),
            events: Vec::new(),
        };
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn login(&self, credentials: &Credentials) -> Result<SessionDescription> {
        self.write("login")?;
        let session = SessionDescription {
            id: Id::new().into(),
            username: credentials.username.clone(),
            display_name: credentials.username.clone(),
            events: Vec::new(),
        };
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn logout(&self) -> Result<()> {
        self.write("logout")?;
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn session(&self) -> Result<Option<SessionDescription>> {
        self.record("session");
        Ok(self.session.lock().unwrap().clone())
    }

    async fn subscribe(&self, _event_id: ApiId) -> Result<NoticeStream> {
        self.record("subscribe");
        let accepted = self.subscriptions.lock().unwrap().pop_front();
        match accepted {
            Some(Some(rx)) => Ok(rx.boxed()),
            _ => Err(Error::Push("refused".to_string())),
        }
    }
}

/// Wait (briefly) for something the store does in the background.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let waited = timeout(Duration::from_secs(2), async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}
