use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::VoterIdentity, mongodb::Id};

use super::timestamp;

/// Author shown for questions submitted without a name.
pub const ANONYMOUS: &str = "Anonymous";

pub const MAX_QUESTION_LENGTH: usize = 500;

pub const MAX_AUTHOR_LENGTH: usize = 64;

/// A single question, as embedded in its event's document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// The question itself.
    pub text: String,
    /// Display name of whoever asked.
    pub author: String,
    /// Everyone who voted for this question. Never leaves the server.
    #[serde(default)]
    pub voters: Vec<VoterIdentity>,
    /// Who asked, so that only they can withdraw it. Never leaves the server.
    pub submitted_by: VoterIdentity,
    /// Set by the event's moderator.
    #[serde(default)]
    pub highlighted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Question {
    /// Create a new question with no votes.
    ///
    /// `text` is required; a missing or blank `author` becomes [`ANONYMOUS`].
    pub fn new(text: &str, author: Option<&str>, submitted_by: VoterIdentity) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::bad_request("Question text is required"));
        }
        if text.chars().count() > MAX_QUESTION_LENGTH {
            return Err(Error::bad_request(format!(
                "Questions are limited to {MAX_QUESTION_LENGTH} characters"
            )));
        }

        let author = author
            .map(str::trim)
            .filter(|author| !author.is_empty())
            .unwrap_or(ANONYMOUS);
        if author.chars().count() > MAX_AUTHOR_LENGTH {
            return Err(Error::bad_request(format!(
                "Names are limited to {MAX_AUTHOR_LENGTH} characters"
            )));
        }

        let now = timestamp();
        Ok(Self {
            id: Id::new(),
            text: text.to_string(),
            author: author.to_string(),
            voters: Vec::new(),
            submitted_by,
            highlighted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// The vote count, always derived from the voters.
    pub fn votes(&self) -> usize {
        self.voters.len()
    }

    /// Was this question asked by `voter`?
    pub fn asked_by(&self, voter: &VoterIdentity) -> bool {
        &self.submitted_by == voter
    }
}
