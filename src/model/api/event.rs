use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, question::QuestionDescription},
    db::event::Event,
};

/// What the moderator supplies to create an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
}

/// A full event snapshot, including every question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescription {
    pub id: ApiId,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<QuestionDescription>,
}

impl From<Event> for EventDescription {
    fn from(event: Event) -> Self {
        Self {
            id: event.id.into(),
            questions: event.questions.iter().map(Into::into).collect(),
            code: event.event.code,
            name: event.event.name,
            created_at: event.event.created_at,
        }
    }
}

/// Just enough to list an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: ApiId,
    pub code: String,
    pub name: String,
}

impl From<Event> for EventSummary {
    fn from(event: Event) -> Self {
        Self {
            id: event.id.into(),
            code: event.event.code,
            name: event.event.name,
        }
    }
}
