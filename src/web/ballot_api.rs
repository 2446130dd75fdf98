use std::convert::Infallible;

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DbError};
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use tracing::info;
use warp::http::StatusCode;
use warp::reply::Response;

use crate::error::{self, ApiError};
use crate::voting::{CastVote, PollId, UnvalidatedCastVote, User, Vote};
use super::db::{models, schema};
use super::poll_api::poll_exists;
use super::{respond, AppState};

#[derive(Serialize)]
struct VoteReply {
    msg: &'static str,
    vote: Vote,
}

pub async fn cast(poll_id: i32, state: AppState, caller: User, body: UnvalidatedCastVote) -> Result<Response, Infallible> {
    let result = cast_vote(&state, caller, PollId(poll_id), body).await.map(|vote| VoteReply {
        msg: "Vote cast successfully",
        vote,
    });
    respond(result, StatusCode::CREATED)
}

async fn cast_vote(state: &AppState, caller: User, poll_id: PollId, body: UnvalidatedCastVote) -> Result<Vote, ApiError> {
    let ballot = CastVote::try_from(body)?;

    let vote = state.run(move |conn| record_vote(conn, &caller, poll_id, ballot)).await?;
    info!(%poll_id, option_id = %vote.option_id, user_id = %vote.user_id, "vote recorded");
    Ok(vote)
}

/// Records the vote and bumps the option's counter in one write transaction,
/// so the counter always equals the number of vote rows for that option.
pub(super) fn record_vote(conn: &mut SqliteConnection, voter: &User, poll_id: PollId, ballot: CastVote) -> Result<Vote, ApiError> {
    conn.immediate_transaction(|conn| {
        if !poll_exists(conn, poll_id)? {
            return Err(error::poll_not_found());
        }

        let option_in_poll: bool = diesel::select(diesel::dsl::exists(
            schema::options::table
                .find(ballot.option_id.0)
                .filter(schema::options::poll_id.eq(poll_id.0)),
        ))
        .get_result(conn)?;
        if !option_in_poll {
            return Err(error::option_not_found());
        }

        let new_vote = models::NewVote {
            poll_id: poll_id.0,
            user_id: voter.id.0,
            option_id: ballot.option_id.0,
            timestamp: Utc::now().naive_utc(),
        };
        let vote = match diesel::insert_into(schema::votes::table)
            .values(&new_vote)
            .returning(models::Vote::as_returning())
            .get_result(conn)
        {
            Ok(vote) => vote,
            Err(DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                return Err(error::already_voted());
            },
            Err(err) => return Err(err.into()),
        };

        diesel::update(schema::options::table.find(ballot.option_id.0))
            .set(schema::options::vote_count.eq(schema::options::vote_count + 1))
            .execute(conn)?;

        Ok(Vote::from(vote))
    })
}
