use std::convert::Infallible;

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DbError};
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::reply::Response;

use crate::error::{self, ApiError, Message};
use crate::voting::{Credentials, Registration, UnvalidatedCredentials, UnvalidatedRegistration, User};
use super::db::{models, schema};
use super::{respond, AppState};

#[derive(Serialize)]
struct LoggedIn {
    msg: &'static str,
    access_token: String,
    is_admin: bool,
}

pub async fn register(state: AppState, body: UnvalidatedRegistration) -> Result<Response, Infallible> {
    let result = register_user(&state, body).await.map(|_| Message { msg: "User created successfully" });
    respond(result, StatusCode::CREATED)
}

pub async fn login(state: AppState, body: UnvalidatedCredentials) -> Result<Response, Infallible> {
    respond(log_in(&state, body).await, StatusCode::OK)
}

async fn register_user(state: &AppState, body: UnvalidatedRegistration) -> Result<User, ApiError> {
    let Registration { username, email, password } = Registration::try_from(body)?;
    let hashed = state.passwords.hash(password).await?;

    let user = state.run(move |conn| insert_user(conn, &username, &email, &hashed)).await?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

async fn log_in(state: &AppState, body: UnvalidatedCredentials) -> Result<LoggedIn, ApiError> {
    let Credentials { email, password } = Credentials::try_from(body)?;

    let found = state.run(move |conn| find_with_hash(conn, &email)).await?;
    let (user, hashed) = found.ok_or_else(error::invalid_email)?;

    if !state.passwords.verify(password, hashed).await? {
        debug!(user_id = %user.id, "password mismatch");
        return Err(error::invalid_password());
    }

    let access_token = state.tokens.issue(&user.email)?;
    info!(user_id = %user.id, "user logged in");
    Ok(LoggedIn {
        msg: "Login successful",
        access_token,
        is_admin: user.is_admin,
    })
}

/// Maps an `Authorization` header to the user it names. Any failure here is
/// an authentication failure.
pub async fn authenticate(state: &AppState, header: Option<&str>) -> Result<User, ApiError> {
    let header = header.ok_or_else(error::missing_token)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(error::invalid_token)?;

    let claims = state.tokens.verify(token)?;
    let found = state.run(move |conn| find_with_hash(conn, &claims.sub)).await?;
    found.map(|(user, _)| user).ok_or_else(error::unknown_identity)
}

/// Inserts a user whose password is already hashed. The email check up
/// front gives the common case its specific message; the unique indexes
/// settle races.
pub fn insert_user(conn: &mut SqliteConnection, username: &str, email: &str, hashed: &str) -> Result<User, ApiError> {
    let email_taken: bool = diesel::select(diesel::dsl::exists(
        schema::users::table.filter(schema::users::email.eq(email)),
    ))
    .get_result(conn)?;
    if email_taken {
        return Err(error::email_in_use());
    }

    let new_user = models::NewUser { username, email, password: hashed };
    let inserted = diesel::insert_into(schema::users::table)
        .values(&new_user)
        .returning(models::User::as_returning())
        .get_result(conn);

    match inserted {
        Ok(user) => Ok(user.into()),
        Err(DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
            if info.message().contains("users.email") {
                Err(error::email_in_use())
            } else {
                Err(error::username_in_use())
            }
        },
        Err(err) => Err(err.into()),
    }
}

fn find_with_hash(conn: &mut SqliteConnection, email: &str) -> Result<Option<(User, String)>, ApiError> {
    let found = schema::users::table
        .filter(schema::users::email.eq(email))
        .select(models::User::as_select())
        .first(conn)
        .optional()?;

    Ok(found.map(|user| {
        let hashed = user.password.clone();
        (User::from(user), hashed)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::db::test_support::TestDb;

    #[test]
    fn duplicate_email_is_a_conflict() {
        let db = TestDb::new();
        let conn = &mut db.conn();
        insert_user(conn, "first", "same@x.com", "hash").unwrap();

        let err = insert_user(conn, "second", "same@x.com", "hash").unwrap_err();
        assert_eq!(err.to_string(), "Email already in use");

        let users: i64 = schema::users::table.count().get_result(conn).unwrap();
        assert_eq!(users, 1);
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = TestDb::new();
        let conn = &mut db.conn();
        insert_user(conn, "taken", "one@x.com", "hash").unwrap();

        let err = insert_user(conn, "taken", "two@x.com", "hash").unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "Username already in use");
    }

    #[test]
    fn new_users_are_not_admins() {
        let db = TestDb::new();
        let user = insert_user(&mut db.conn(), "someone", "s@x.com", "hash").unwrap();
        assert!(!user.is_admin);

        let (found, hashed) = find_with_hash(&mut db.conn(), "s@x.com").unwrap().unwrap();
        assert_eq!(found, user);
        assert_eq!(hashed, "hash");
    }
}
