use std::convert::Infallible;

use tracing::debug;
use warp::http::StatusCode;
use warp::reply::Response;

use crate::error::{self, ApiError};
use crate::voting::{PollId, PollResult, User};
use super::poll_api::load_poll;
use super::{respond, AppState};

pub async fn get_result(poll_id: i32, state: AppState, caller: User) -> Result<Response, Infallible> {
    respond(tally(&state, caller, PollId(poll_id)).await, StatusCode::OK)
}

async fn tally(state: &AppState, caller: User, poll_id: PollId) -> Result<PollResult, ApiError> {
    caller.require_admin(error::unauthorized)?;

    let poll = state.run(move |conn| load_poll(conn, poll_id)).await?;
    let result = PollResult::from(poll);
    debug!(%poll_id, total = result.total_votes(), "tallied poll");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::auth::{PasswordHasher, TokenCodec};
    use crate::voting::{CastVote, CreatePollSettings, OptionTally};
    use crate::web::ballot_api::record_vote;
    use crate::web::db::test_support::TestDb;
    use crate::web::poll_api::insert_poll;

    fn state(db: &TestDb) -> AppState {
        AppState::new(db.pool.clone(), TokenCodec::new("k", Duration::minutes(1)), PasswordHasher::fastest())
    }

    #[tokio::test]
    async fn counts_match_cast_votes() {
        let db = TestDb::new();
        let admin = db.user("admin", true);
        let poll = insert_poll(&mut db.conn(), &admin, &CreatePollSettings {
            question: String::from("Q"),
            options: vec![String::from("A"), String::from("B"), String::from("C")],
        })
        .unwrap();
        for (name, option) in [("u1", 0), ("u2", 2), ("u3", 2)] {
            let voter = db.user(name, false);
            record_vote(&mut db.conn(), &voter, poll.id, CastVote { option_id: poll.options[option].id }).unwrap();
        }

        let result = tally(&state(&db), admin, poll.id).await.unwrap();
        assert_eq!(result.total_votes(), 3);
        assert_eq!(result.results, vec![
            OptionTally { option: String::from("A"), votes: 1 },
            OptionTally { option: String::from("B"), votes: 0 },
            OptionTally { option: String::from("C"), votes: 2 },
        ]);
    }

    #[tokio::test]
    async fn non_admin_is_refused_even_for_missing_polls() {
        let db = TestDb::new();
        let voter = db.user("voter", false);
        let err = tally(&state(&db), voter, PollId(9)).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
