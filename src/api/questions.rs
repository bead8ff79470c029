use mongodb::{
    bson::{doc, to_bson, DateTime as BsonDateTime, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        question::{HighlightRequest, QuestionDescription, QuestionSubmission, VoteRequest},
    },
    common::{VotePolicy, VoterIdentity},
    db::{event::Event, question::Question, timestamp},
    mongodb::{Coll, Id},
};
use crate::rooms::Rooms;

use super::common::{event_by_id, question_in};

pub fn routes() -> Vec<Route> {
    routes![submit_question, vote, withdraw_question, highlight_question]
}

#[post("/events/<event_id>/questions", data = "<submission>", format = "json")]
pub async fn submit_question(
    event_id: Id,
    submission: Json<QuestionSubmission>,
    voter: VoterIdentity,
    events: Coll<Event>,
    rooms: &State<Rooms>,
) -> Result<Json<QuestionDescription>> {
    let question = Question::new(&submission.text, submission.user.as_deref(), voter)?;

    let push = doc! {
        "$push": { "questions": to_bson(&question)? },
    };
    let result = events.update_one(event_id.as_doc(), push, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Event with ID '{event_id}'")));
    }
    debug!("Question {} submitted to event {event_id}", question.id);

    rooms.notify(event_id);
    Ok(Json(question.into()))
}

#[patch(
    "/events/<event_id>/questions/<question_id>",
    data = "<request>",
    format = "json"
)]
pub async fn vote(
    event_id: Id,
    question_id: Id,
    request: Json<VoteRequest>,
    voter: VoterIdentity,
    events: Coll<Event>,
    config: &State<Config>,
    rooms: &State<Rooms>,
) -> Result<Json<QuestionDescription>> {
    let now = timestamp();
    let update = if request.vote {
        config.vote_policy().cast(&voter, now)
    } else {
        VotePolicy::retract(&voter, now)
    };

    let event = update_question(&events, event_id, question_id, update).await?;
    let question = question_in(&event, question_id)?;
    debug!(
        "{voter} {} question {question_id}, now at {} vote(s)",
        if request.vote { "voted for" } else { "retracted their vote on" },
        question.votes()
    );

    rooms.notify(event_id);
    Ok(Json(question.into()))
}

#[delete("/events/<event_id>/questions/<question_id>")]
pub async fn withdraw_question(
    event_id: Id,
    question_id: Id,
    voter: VoterIdentity,
    token: Option<AuthToken>,
    events: Coll<Event>,
    rooms: &State<Rooms>,
) -> Result<()> {
    let event = event_by_id(&events, event_id).await?;
    let question = question_in(&event, question_id)?;

    let moderator = token.map_or(false, |token| event.is_moderated_by(token.id));
    if !question.asked_by(&voter) && !moderator {
        return Err(Error::forbidden(
            "Only the asker or the moderator can withdraw a question",
        ));
    }

    let pull = doc! {
        "$pull": { "questions": { "_id": question_id } },
    };
    events.update_one(event_id.as_doc(), pull, None).await?;
    debug!("Question {question_id} withdrawn from event {event_id}");

    rooms.notify(event_id);
    Ok(())
}

#[put(
    "/events/<event_id>/questions/<question_id>/highlight",
    data = "<request>",
    format = "json"
)]
pub async fn highlight_question(
    token: AuthToken,
    event_id: Id,
    question_id: Id,
    request: Json<HighlightRequest>,
    events: Coll<Event>,
    rooms: &State<Rooms>,
) -> Result<Json<QuestionDescription>> {
    let event = event_by_id(&events, event_id).await?;
    if !event.is_moderated_by(token.id) {
        return Err(Error::forbidden("Only the moderator can highlight questions"));
    }
    question_in(&event, question_id)?;

    let update = doc! {
        "$set": {
            "questions.$.highlighted": request.highlighted,
            "questions.$.updated_at": BsonDateTime::from_chrono(timestamp()),
        },
    };
    let event = update_question(&events, event_id, question_id, update).await?;
    let question = question_in(&event, question_id)?;

    rooms.notify(event_id);
    Ok(Json(question.into()))
}

/// Atomically apply `update` to one question, addressed with the positional
/// `$` operator, and return the updated event.
async fn update_question(
    events: &Coll<Event>,
    event_id: Id,
    question_id: Id,
    update: Document,
) -> Result<Event> {
    let filter = doc! {
        "_id": event_id,
        "questions._id": question_id,
    };
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    events
        .find_one_and_update(filter, update, options)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!(
                "Question with ID '{question_id}' in event '{event_id}'"
            ))
        })
}
