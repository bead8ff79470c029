use reqwest::{header::ACCEPT, Client, Response};
use rocket::{
    futures::{
        stream::{self, BoxStream},
        StreamExt,
    },
    serde::json::serde_json,
};
use serde::de::DeserializeOwned;

use crate::model::api::{
    account::{Credentials, DeviceRegistration, RegisterRequest, Registration, SessionDescription},
    event::{EventDescription, EventSpec},
    id::ApiId,
    question::{QuestionDescription, QuestionSubmission, VoteRequest},
};
use crate::rooms::QUESTIONS_UPDATED;

use super::{
    sse::{SseDecoder, SseMessage},
    Error, Result,
};

/// Something the server pushed about the joined event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The event's questions changed; re-fetch it.
    QuestionsUpdated,
}

impl Notice {
    fn from_message(message: &SseMessage) -> Option<Self> {
        if message.event == QUESTIONS_UPDATED {
            Some(Self::QuestionsUpdated)
        } else {
            trace!("Ignoring pushed {:?} event", message.event);
            None
        }
    }
}

/// Notices for one event. Ends when the server closes the channel.
pub type NoticeStream = BoxStream<'static, Result<Notice>>;

/// The server's API, as seen by the store.
#[rocket::async_trait]
pub trait QnaApi: Send + Sync + 'static {
    async fn event_id_by_code(&self, code: &str) -> Result<ApiId>;

    async fn event(&self, event_id: ApiId) -> Result<EventDescription>;

    async fn create_event(&self, spec: &EventSpec) -> Result<EventDescription>;

    async fn submit_question(
        &self,
        event_id: ApiId,
        submission: &QuestionSubmission,
    ) -> Result<QuestionDescription>;

    async fn vote(
        &self,
        event_id: ApiId,
        question_id: ApiId,
        vote: bool,
    ) -> Result<QuestionDescription>;

    async fn withdraw_question(&self, event_id: ApiId, question_id: ApiId) -> Result<()>;

    async fn register_device(&self, computer_id: &str) -> Result<()>;

    async fn register_account(&self, registration: &Registration) -> Result<SessionDescription>;

    async fn login(&self, credentials: &Credentials) -> Result<SessionDescription>;

    async fn logout(&self) -> Result<()>;

    async fn session(&self) -> Result<Option<SessionDescription>>;

    /// Join the event's room.
    async fn subscribe(&self, event_id: ApiId) -> Result<NoticeStream>;
}

/// [`QnaApi`] over HTTP. Cookies are kept between requests, so the session
/// and device registration apply to everything sent afterwards.
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Fail on any non-2xx response, keeping its body for the error.
async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            status: status.as_u16(),
            body,
        })
    }
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = checked(response).await?.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
}

#[rocket::async_trait]
impl QnaApi for HttpApi {
    async fn event_id_by_code(&self, code: &str) -> Result<ApiId> {
        let response = self
            .client
            .get(self.url("/events"))
            .query(&[("code", code)])
            .send()
            .await?;
        json(response).await
    }

    async fn event(&self, event_id: ApiId) -> Result<EventDescription> {
        let response = self
            .client
            .get(self.url(&format!("/events/{event_id}")))
            .send()
            .await?;
        json(response).await
    }

    async fn create_event(&self, spec: &EventSpec) -> Result<EventDescription> {
        let response = self
            .client
            .post(self.url("/events"))
            .json(spec)
            .send()
            .await?;
        json(response).await
    }

    async fn submit_question(
        &self,
        event_id: ApiId,
        submission: &QuestionSubmission,
    ) -> Result<QuestionDescription> {
        let response = self
            .client
            .post(self.url(&format!("/events/{event_id}/questions")))
            .json(submission)
            .send()
            .await?;
        json(response).await
    }

    async fn vote(
        &self,
        event_id: ApiId,
        question_id: ApiId,
        vote: bool,
    ) -> Result<QuestionDescription> {
        let response = self
            .client
            .patch(self.url(&format!("/events/{event_id}/questions/{question_id}")))
            .json(&VoteRequest { vote })
            .send()
            .await?;
        json(response).await
    }

    async fn withdraw_question(&self, event_id: ApiId, question_id: ApiId) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/events/{event_id}/questions/{question_id}")))
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    async fn register_device(&self, computer_id: &str) -> Result<()> {
        let registration = DeviceRegistration {
            computer_id: computer_id.to_string(),
        };
        let response = self
            .client
            .post(self.url("/singularity"))
            .json(&registration)
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    async fn register_account(&self, registration: &Registration) -> Result<SessionDescription> {
        let request = RegisterRequest {
            user: registration.clone(),
        };
        let response = self
            .client
            .post(self.url("/account/register"))
            .json(&request)
            .send()
            .await?;
        json(response).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<SessionDescription> {
        let response = self
            .client
            .post(self.url("/account/session"))
            .json(credentials)
            .send()
            .await?;
        json(response).await
    }

    async fn logout(&self) -> Result<()> {
        let response = self
            .client
            .delete(self.url("/account/session"))
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    async fn session(&self) -> Result<Option<SessionDescription>> {
        let response = self
            .client
            .get(self.url("/account/session"))
            .send()
            .await?;
        json(response).await
    }

    async fn subscribe(&self, event_id: ApiId) -> Result<NoticeStream> {
        let response = self
            .client
            .get(self.url(&format!("/events/{event_id}/updates")))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = checked(response).await?;
        debug!("Subscribed to updates for event {event_id}");

        let mut decoder = SseDecoder::default();
        let notices = response
            .bytes_stream()
            .flat_map(move |chunk| {
                let notices: Vec<Result<Notice>> = match chunk {
                    Ok(bytes) => decoder
                        .feed(&bytes)
                        .iter()
                        .filter_map(Notice::from_message)
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(Error::Push(e.to_string()))],
                };
                stream::iter(notices)
            });
        Ok(notices.boxed())
    }
}
