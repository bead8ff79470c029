use mongodb::bson::doc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        event::{EventDescription, EventSpec},
        id::ApiId,
    },
    db::event::{normalize_code, Event, NewEvent},
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::rooms::Rooms;

use super::common::event_by_id;

/// How many fresh join codes to try before giving up on creating an event.
const MAX_CODE_ATTEMPTS: usize = 5;

pub fn routes() -> Vec<Route> {
    routes![event_id_by_code, event, create_event, delete_event]
}

#[get("/events?<code>")]
pub async fn event_id_by_code(code: &str, events: Coll<Event>) -> Result<Json<ApiId>> {
    let code = normalize_code(code);
    let event = events
        .find_one(doc! { "code": &code }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Event with code '{code}'")))?;
    Ok(Json(event.id.into()))
}

#[get("/events/<event_id>")]
pub async fn event(event_id: Id, events: Coll<Event>) -> Result<Json<EventDescription>> {
    let event = event_by_id(&events, event_id).await?;
    Ok(Json(event.into()))
}

#[post("/events", data = "<spec>", format = "json")]
pub async fn create_event(
    token: AuthToken,
    spec: Json<EventSpec>,
    new_events: Coll<NewEvent>,
) -> Result<Json<EventDescription>> {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let event = NewEvent::new(&spec.name, token.id, &mut rand::thread_rng())?;
        match new_events.insert_one(&event, None).await {
            Ok(result) => {
                let id: Id = result
                    .inserted_id
                    .as_object_id()
                    .ok_or_else(|| {
                        Error::Status(
                            Status::InternalServerError,
                            "Inserted event has no ObjectId".to_string(),
                        )
                    })?
                    .into();
                info!("Account {} created event {id} ({})", token.id, event.code);
                return Ok(Json(Event { id, event }.into()));
            }
            Err(e) if is_duplicate_key_error(&e) => {
                warn!(
                    "Join code {} already taken, retrying (attempt {attempt}/{MAX_CODE_ATTEMPTS})",
                    event.code
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Status(
        Status::ServiceUnavailable,
        "Could not allocate a unique join code".to_string(),
    ))
}

#[delete("/events/<event_id>")]
pub async fn delete_event(
    token: AuthToken,
    event_id: Id,
    events: Coll<Event>,
    rooms: &State<Rooms>,
) -> Result<()> {
    let event = event_by_id(&events, event_id).await?;
    if !event.is_moderated_by(token.id) {
        return Err(Error::forbidden("Only the moderator can delete an event"));
    }

    events.delete_one(event_id.as_doc(), None).await?;
    info!("Deleted event {event_id} ({})", event.code);

    // Anyone still watching re-fetches and finds the event gone.
    rooms.notify(event_id);
    Ok(())
}
