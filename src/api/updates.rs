use rocket::{
    response::stream::{Event as SseEvent, EventStream},
    tokio::select,
    Route, Shutdown, State,
};

use crate::error::Result;
use crate::model::{db::event::Event, mongodb::{Coll, Id}};
use crate::rooms::{Rooms, QUESTIONS_UPDATED};

use super::common::event_by_id;

pub fn routes() -> Vec<Route> {
    routes![updates]
}

/// Join an event's room. Every change to its questions is announced with a
/// payload-free `questions updated` event; clients re-fetch the snapshot.
#[get("/events/<event_id>/updates")]
pub async fn updates(
    event_id: Id,
    events: Coll<Event>,
    rooms: &State<Rooms>,
    mut end: Shutdown,
) -> Result<EventStream![]> {
    event_by_id(&events, event_id).await?;
    let mut room = rooms.join(event_id);
    debug!("Joined room for event {event_id}");

    Ok(EventStream! {
        loop {
            let notice = select! {
                biased;
                notice = room.recv() => notice,
                _ = &mut end => break,
            };
            match notice {
                Some(()) => yield SseEvent::empty().event(QUESTIONS_UPDATED),
                None => break,
            }
        }
        debug!("Left room for event {}", room.event_id());
    })
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use crate::model::api::question::QuestionSubmission;

    use super::*;

    #[backend_test]
    async fn unknown_event(client: Client) {
        let response = client.get(uri!(updates(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(device)]
    async fn question_changes_are_pushed(client: Client, events: Coll<Event>) {
        let event = Event::example(Id::new());
        events.insert_one(&event, None).await.unwrap();

        let stream = client.get(uri!(updates(event.id))).dispatch().await;
        assert_eq!(Status::Ok, stream.status());
        assert_eq!(stream.content_type(), Some(ContentType::EventStream));

        client
            .post(format!("/events/{}/questions", event.id))
            .header(ContentType::JSON)
            .body(json!(QuestionSubmission::example()).to_string())
            .dispatch()
            .await;

        // Shutting down ends the stream, after the pending notice is flushed.
        client.rocket().shutdown().notify();
        let body = stream.into_string().await.unwrap();
        assert_eq!(body.matches(QUESTIONS_UPDATED).count(), 1);
    }

    #[backend_test]
    async fn other_rooms_stay_quiet(client: Client, events: Coll<Event>) {
        let watched = Event::example(Id::new());
        let other = Event::example(Id::new());
        events.insert_one(&watched, None).await.unwrap();
        events.insert_one(&other, None).await.unwrap();

        let stream = client.get(uri!(updates(watched.id))).dispatch().await;
        client.rocket().state::<Rooms>().unwrap().notify(other.id);

        client.rocket().shutdown().notify();
        let body = stream.into_string().await.unwrap();
        assert!(!body.contains(QUESTIONS_UPDATED));
    }
}
