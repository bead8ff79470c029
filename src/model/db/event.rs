use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

use super::{question::Question, timestamp};

/// Length of a join code.
pub const CODE_LENGTH: usize = 6;

/// Join codes avoid characters that are easily confused when read aloud or
/// off a projector (`0`/`O`, `1`/`I`).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const MAX_NAME_LENGTH: usize = 120;

/// Core event data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCore {
    /// Unique join code.
    pub code: String,
    /// Human-readable title.
    pub name: String,
    /// The account that moderates this event.
    pub owner: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Questions in the order they were asked.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl EventCore {
    /// Create a new event with no questions and a fresh join code.
    pub fn new(name: &str, owner: Id, rng: &mut impl Rng) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::bad_request("Event name is required"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::bad_request(format!(
                "Event names are limited to {MAX_NAME_LENGTH} characters"
            )));
        }

        Ok(Self {
            code: generate_code(rng),
            name: name.to_string(),
            owner,
            created_at: timestamp(),
            questions: Vec::new(),
        })
    }
}

/// An event without an ID.
pub type NewEvent = EventCore;

/// An event from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: EventCore,
}

impl Event {
    /// Get the question with the given ID, if it exists.
    pub fn question(&self, question_id: Id) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Is the given account this event's moderator?
    pub fn is_moderated_by(&self, account: Id) -> bool {
        self.owner == account
    }
}

impl Deref for Event {
    type Target = EventCore;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl DerefMut for Event {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.event
    }
}

/// Generate a random join code.
pub fn generate_code(rng: &mut impl Rng) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Join codes are case-insensitive and forgiving of stray whitespace.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}


#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::bson::{from_document, to_document};

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|c| CODE_ALPHABET.contains(&c)));
            assert!(!code.contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn codes_normalize() {
        assert_eq!(normalize_code(" abc2de\n"), "ABC2DE");
        assert_eq!(normalize_code("XYZ789"), "XYZ789");
    }

    #[test]
    fn new_event() {
        let owner = Id::new();
        let event = EventCore::new("  Town hall ", owner, &mut rand::thread_rng()).unwrap();
        assert_eq!(event.name, "Town hall");
        assert_eq!(event.owner, owner);
        assert!(event.questions.is_empty());
        assert_eq!(event.code.len(), CODE_LENGTH);

        assert!(EventCore::new(" ", owner, &mut rand::thread_rng()).is_err());
        let long_name = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(EventCore::new(&long_name, owner, &mut rand::thread_rng()).is_err());
    }

    #[test]
    fn lookups() {
        let owner = Id::new();
        let event = Event::example(owner);
        let first = event.questions[0].id;
        assert_eq!(event.question(first).unwrap().text, "What time is lunch?");
        assert!(event.question(Id::new()).is_none());
        assert!(event.is_moderated_by(owner));
        assert!(!event.is_moderated_by(Id::new()));
    }

    #[test]
    fn stored_form() {
        let event = Event::example(Id::new());
        let document = to_document(&event).unwrap();
        assert!(document.get_object_id("_id").is_ok());
        assert_eq!(document.get_str("code").unwrap(), event.code);
        assert_eq!(document.get_array("questions").unwrap().len(), 2);

        let restored: Event = from_document(document).unwrap();
        assert_eq!(restored, event);
    }
}
