use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::voting;
use super::schema;

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
}

impl From<User> for voting::User {
    fn from(value: User) -> Self {
        voting::User {
            id: voting::UserId(value.id),
            email: value.email,
            username: value.username,
            is_admin: value.is_admin,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Associations, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::polls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct Poll {
    pub id: i32,
    pub question: String,
    pub created_at: NaiveDateTime,
    pub user_id: i32,
    pub is_multiple_choice: bool,
}

impl From<(Poll, Vec<PollOption>)> for voting::Poll {
    fn from((poll, options): (Poll, Vec<PollOption>)) -> Self {
        voting::Poll {
            id: voting::PollId(poll.id),
            question: poll.question,
            created_at: poll.created_at.and_utc(),
            user_id: voting::UserId(poll.user_id),
            is_multiple_choice: poll.is_multiple_choice,
            options: options.into_iter().map(voting::PollOption::from).collect(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::polls)]
pub struct NewPoll<'a> {
    pub question: &'a str,
    pub created_at: NaiveDateTime,
    pub user_id: i32,
}

#[derive(Debug, Associations, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::options)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Poll))]
pub struct PollOption {
    pub id: i32,
    pub text: String,
    pub vote_count: i32,
    pub poll_id: i32,
}

impl From<PollOption> for voting::PollOption {
    fn from(value: PollOption) -> Self {
        voting::PollOption {
            id: voting::OptionId(value.id),
            text: value.text,
            vote_count: value.vote_count,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::options)]
pub struct NewPollOption<'a> {
    pub text: &'a str,
    pub poll_id: i32,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = schema::votes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Vote {
    pub id: i32,
    pub poll_id: i32,
    pub user_id: i32,
    pub option_id: i32,
    pub timestamp: NaiveDateTime,
}

impl From<Vote> for voting::Vote {
    fn from(value: Vote) -> Self {
        voting::Vote {
            id: voting::VoteId(value.id),
            poll_id: voting::PollId(value.poll_id),
            user_id: voting::UserId(value.user_id),
            option_id: voting::OptionId(value.option_id),
            timestamp: value.timestamp.and_utc(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::votes)]
pub struct NewVote {
    pub poll_id: i32,
    pub user_id: i32,
    pub option_id: i32,
    pub timestamp: NaiveDateTime,
}
