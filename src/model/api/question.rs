use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::question::Question};

/// A question as clients see it: voter identities are replaced by their count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDescription {
    pub id: ApiId,
    pub text: String,
    pub author: String,
    pub highlighted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub votes: usize,
}

impl From<&Question> for QuestionDescription {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.into(),
            text: question.text.clone(),
            author: question.author.clone(),
            highlighted: question.highlighted,
            created_at: question.created_at,
            updated_at: question.updated_at,
            votes: question.votes(),
        }
    }
}

impl From<Question> for QuestionDescription {
    fn from(question: Question) -> Self {
        Self::from(&question)
    }
}

/// A new question. `user` is the display name to ask under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSubmission {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Cast (`true`) or retract (`false`) the caller's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub vote: bool,
}

/// Moderator request to (un)highlight a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRequest {
    pub highlighted: bool,
}

#[cfg(test)]
mod examples {
    use super::*;

    impl QuestionSubmission {
        pub fn example() -> Self {
            Self {
                text: "What time is lunch?".to_string(),
                user: Some("Alice".to_string()),
            }
        }

        pub fn anonymous_example() -> Self {
            Self {
                text: "Will the slides be shared?".to_string(),
                user: None,
            }
        }
    }
}
