use std::convert::Infallible;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use warp::http::StatusCode;
use warp::reply::Response;

use crate::error::{self, ApiError};
use crate::voting::User;
use super::db::{models, schema};
use super::{respond, AppState};

pub async fn list(state: AppState, caller: User) -> Result<Response, Infallible> {
    respond(list_users(&state, caller).await, StatusCode::OK)
}

async fn list_users(state: &AppState, caller: User) -> Result<Vec<User>, ApiError> {
    caller.require_admin(error::unauthorized)?;
    state.run(load_users).await
}

fn load_users(conn: &mut SqliteConnection) -> Result<Vec<User>, ApiError> {
    let users = schema::users::table
        .order(schema::users::id)
        .select(models::User::as_select())
        .load(conn)?;
    Ok(users.into_iter().map(User::from).collect())
}

/// Grants admin rights to every registered user whose email is listed.
/// Emails with no account are skipped; returns how many rows changed.
pub fn promote_admins(conn: &mut SqliteConnection, emails: &[String]) -> Result<usize, ApiError> {
    if emails.is_empty() {
        return Ok(0);
    }
    let promoted = diesel::update(
        schema::users::table
            .filter(schema::users::email.eq_any(emails))
            .filter(schema::users::is_admin.eq(false)),
    )
    .set(schema::users::is_admin.eq(true))
    .execute(conn)?;
    Ok(promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::db::test_support::TestDb;

    #[test]
    fn promotion_only_touches_listed_accounts() {
        let db = TestDb::new();
        db.user("alice", false);
        db.user("bob", false);

        let emails = vec![String::from("alice@x.com"), String::from("ghost@x.com")];
        assert_eq!(promote_admins(&mut db.conn(), &emails).unwrap(), 1);
        // already promoted
        assert_eq!(promote_admins(&mut db.conn(), &emails).unwrap(), 0);

        let users = load_users(&mut db.conn()).unwrap();
        let admins: Vec<&str> = users.iter().filter(|u| u.is_admin).map(|u| u.username.as_str()).collect();
        assert_eq!(admins, vec!["alice"]);
    }

    #[test]
    fn users_are_listed_in_registration_order() {
        let db = TestDb::new();
        let first = db.user("first", true);
        let second = db.user("second", false);
        assert_eq!(load_users(&mut db.conn()).unwrap(), vec![first, second]);
    }
}
