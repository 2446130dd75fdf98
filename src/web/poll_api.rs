use std::convert::Infallible;

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use serde_json::error::Category;
use tracing::info;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;

use crate::error::{self, ApiError, Message};
use crate::voting::{
    CreatePollSettings, Poll, PollId, UnvalidatedCreatePollSettings, UnvalidatedUpdatePollSettings,
    UpdatePollSettings, User,
};
use super::db::{models, schema};
use super::{parse_body, respond, AppState};

#[derive(Serialize)]
struct PollReply {
    msg: &'static str,
    poll: Poll,
}

pub async fn create(state: AppState, caller: User, body: Bytes) -> Result<Response, Infallible> {
    let result = create_poll(&state, caller, body).await.map(|poll| PollReply {
        msg: "Poll created successfully",
        poll,
    });
    respond(result, StatusCode::CREATED)
}

pub async fn list(state: AppState, _caller: User) -> Result<Response, Infallible> {
    respond(state.run(load_polls).await, StatusCode::OK)
}

pub async fn edit(poll_id: i32, state: AppState, caller: User, body: Bytes) -> Result<Response, Infallible> {
    let result = edit_poll(&state, caller, PollId(poll_id), body).await.map(|poll| PollReply {
        msg: "Poll updated successfully",
        poll,
    });
    respond(result, StatusCode::OK)
}

pub async fn delete(poll_id: i32, state: AppState, caller: User) -> Result<Response, Infallible> {
    let result = delete_poll(&state, caller, PollId(poll_id)).await.map(|_| Message { msg: "Poll deleted" });
    respond(result, StatusCode::OK)
}

async fn create_poll(state: &AppState, caller: User, body: Bytes) -> Result<Poll, ApiError> {
    caller.require_admin(error::not_authorized_to_create)?;
    let body: UnvalidatedCreatePollSettings = serde_json::from_slice(&body).map_err(|err| match err.classify() {
        // well-formed JSON whose fields have the wrong shape
        Category::Data => error::missing_poll_fields(),
        _ => error::invalid_body(&err.to_string()),
    })?;
    let settings = CreatePollSettings::try_from(body)?;

    let poll = state.run(move |conn| insert_poll(conn, &caller, &settings)).await?;
    info!(poll_id = %poll.id, options = poll.options.len(), "poll created");
    Ok(poll)
}

async fn edit_poll(state: &AppState, caller: User, poll_id: PollId, body: Bytes) -> Result<Poll, ApiError> {
    caller.require_admin(error::unauthorized)?;
    let changes: UnvalidatedUpdatePollSettings = parse_body(&body)?;

    let poll = state.run(move |conn| update_poll(conn, poll_id, changes)).await?;
    info!(%poll_id, "poll updated");
    Ok(poll)
}

async fn delete_poll(state: &AppState, caller: User, poll_id: PollId) -> Result<(), ApiError> {
    caller.require_admin(error::unauthorized)?;

    state.run(move |conn| remove_poll(conn, poll_id)).await?;
    info!(%poll_id, "poll deleted");
    Ok(())
}

pub(super) fn insert_poll(conn: &mut SqliteConnection, creator: &User, settings: &CreatePollSettings) -> Result<Poll, ApiError> {
    conn.immediate_transaction(|conn| {
        let new_poll = models::NewPoll {
            question: &settings.question,
            created_at: Utc::now().naive_utc(),
            user_id: creator.id.0,
        };
        let poll = diesel::insert_into(schema::polls::table)
            .values(&new_poll)
            .returning(models::Poll::as_returning())
            .get_result(conn)?;
        let options = insert_options(conn, poll.id, &settings.options)?;

        Ok(Poll::from((poll, options)))
    })
}

/// Replaces whatever the poll holds, but only while nobody has voted on it.
/// The changes are validated once the poll is known to be editable.
pub(super) fn update_poll(conn: &mut SqliteConnection, poll_id: PollId, changes: UnvalidatedUpdatePollSettings) -> Result<Poll, ApiError> {
    conn.immediate_transaction(|conn| {
        if !poll_exists(conn, poll_id)? {
            return Err(error::poll_not_found());
        }

        let has_votes: bool = diesel::select(diesel::dsl::exists(
            schema::votes::table.filter(schema::votes::poll_id.eq(poll_id.0)),
        ))
        .get_result(conn)?;
        if has_votes {
            return Err(error::poll_has_votes());
        }
        let changes = UpdatePollSettings::try_from(changes)?;

        if let Some(question) = &changes.question {
            diesel::update(schema::polls::table.find(poll_id.0))
                .set(schema::polls::question.eq(question))
                .execute(conn)?;
        }

        if let Some(options) = &changes.options {
            diesel::delete(schema::options::table.filter(schema::options::poll_id.eq(poll_id.0)))
                .execute(conn)?;
            insert_options(conn, poll_id.0, options)?;
        }

        load_poll(conn, poll_id)
    })
}

/// Options and votes go with the poll through the schema's cascades.
pub(super) fn remove_poll(conn: &mut SqliteConnection, poll_id: PollId) -> Result<(), ApiError> {
    let deleted = diesel::delete(schema::polls::table.find(poll_id.0)).execute(conn)?;
    if deleted == 0 {
        return Err(error::poll_not_found());
    }
    Ok(())
}

pub(super) fn load_poll(conn: &mut SqliteConnection, poll_id: PollId) -> Result<Poll, ApiError> {
    let poll = schema::polls::table
        .find(poll_id.0)
        .select(models::Poll::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(error::poll_not_found)?;

    let options = models::PollOption::belonging_to(&poll)
        .order(schema::options::id)
        .select(models::PollOption::as_select())
        .load(conn)?;

    Ok(Poll::from((poll, options)))
}

pub(super) fn load_polls(conn: &mut SqliteConnection) -> Result<Vec<Poll>, ApiError> {
    let polls = schema::polls::table
        .order(schema::polls::id)
        .select(models::Poll::as_select())
        .load(conn)?;

    let options = models::PollOption::belonging_to(&polls)
        .order(schema::options::id)
        .select(models::PollOption::as_select())
        .load(conn)?;

    Ok(options
        .grouped_by(&polls)
        .into_iter()
        .zip(polls)
        .map(|(options, poll)| Poll::from((poll, options)))
        .collect())
}

pub(super) fn poll_exists(conn: &mut SqliteConnection, poll_id: PollId) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(schema::polls::table.find(poll_id.0))).get_result(conn)
}

fn insert_options(conn: &mut SqliteConnection, poll_id: i32, texts: &[String]) -> QueryResult<Vec<models::PollOption>> {
    texts
        .iter()
        .map(|text| {
            diesel::insert_into(schema::options::table)
                .values(&models::NewPollOption { text, poll_id })
                .returning(models::PollOption::as_returning())
                .get_result(conn)
        })
        .collect()
}
