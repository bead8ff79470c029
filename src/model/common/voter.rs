use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An opaque string identifying who cast a vote or submitted a question.
///
/// Signed-in accounts vote as themselves; anyone else votes as the device
/// they registered with `/singularity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterIdentity(String);

impl VoterIdentity {
    pub fn account(id: Id) -> Self {
        Self(format!("account:{id}"))
    }

    pub fn device(computer_id: &str) -> Self {
        Self(format!("device:{computer_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VoterIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&VoterIdentity> for Bson {
    fn from(voter: &VoterIdentity) -> Self {
        Bson::String(voter.0.clone())
    }
}

/// Whether one voter identity may vote for the same question more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotePolicy {
    /// At most one vote per identity per question.
    #[default]
    Unique,
    /// Every cast vote counts, even repeated ones.
    Unrestricted,
}

impl Display for VotePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unique => "unique",
            Self::Unrestricted => "unrestricted",
        })
    }
}

impl VotePolicy {
    /// Update that casts `voter`'s vote on the question matched by the
    /// positional `$` operator of the accompanying filter.
    pub fn cast(self, voter: &VoterIdentity, now: DateTime<Utc>) -> Document {
        let operator = match self {
            Self::Unique => "$addToSet",
            Self::Unrestricted => "$push",
        };
        let mut update = touch(now);
        update.insert(operator, doc! { "questions.$.voters": voter });
        update
    }

    /// Update that removes every vote `voter` cast on the matched question.
    /// Retraction is the same under both policies.
    pub fn retract(voter: &VoterIdentity, now: DateTime<Utc>) -> Document {
        let mut update = touch(now);
        update.insert("$pull", doc! { "questions.$.voters": voter });
        update
    }
}

/// Bump the matched question's modification time.
fn touch(now: DateTime<Utc>) -> Document {
    doc! {
        "$set": { "questions.$.updated_at": BsonDateTime::from_chrono(now) },
    }
}
