use crate::error::{Error, Result};
use crate::model::{
    db::{event::Event, question::Question},
    mongodb::{Coll, Id},
};

/// Get an event from the database by its ID.
pub async fn event_by_id(events: &Coll<Event>, event_id: Id) -> Result<Event> {
    events
        .find_one(event_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Event with ID '{event_id}'")))
}

/// Get a question out of its event.
pub fn question_in(event: &Event, question_id: Id) -> Result<&Question> {
    event.question(question_id).ok_or_else(|| {
        Error::not_found(format!(
            "Question with ID '{question_id}' in event '{}'",
            event.id
        ))
    })
}
