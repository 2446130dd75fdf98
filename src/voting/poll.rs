use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OptionId, PollId, UserId};
use crate::error::{self, ApiError};

pub const MIN_OPTIONS: usize = 2;

#[derive(Clone, Debug, Serialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub is_multiple_choice: bool,
    /// In the order they were submitted.
    pub options: Vec<PollOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
    #[serde(rename = "votes")]
    pub vote_count: i32,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct UnvalidatedCreatePollSettings {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct CreatePollSettings {
    pub question: String,
    pub options: Vec<String>,
}

impl TryFrom<UnvalidatedCreatePollSettings> for CreatePollSettings {
    type Error = ApiError;
    fn try_from(value: UnvalidatedCreatePollSettings) -> Result<Self, Self::Error> {
        let question = value.question.filter(|q| !q.is_empty());
        let options = value.options.filter(|o| o.len() >= MIN_OPTIONS);
        let (question, options) = match (question, options) {
            (Some(q), Some(o)) => (q, o),
            _ => return Err(error::missing_poll_fields()),
        };
        check_option_texts(&options)?;

        Ok(Self { question, options })
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct UnvalidatedUpdatePollSettings {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
}

/// Replacement values for an existing poll. `None` leaves that part alone;
/// empty values in the request are treated as absent.
#[derive(Debug, Default)]
pub struct UpdatePollSettings {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
}

impl TryFrom<UnvalidatedUpdatePollSettings> for UpdatePollSettings {
    type Error = ApiError;
    fn try_from(value: UnvalidatedUpdatePollSettings) -> Result<Self, Self::Error> {
        let question = value.question.filter(|q| !q.is_empty());
        let options = value.options.filter(|o| !o.is_empty());

        if let Some(options) = &options {
            if options.len() < MIN_OPTIONS {
                return Err(error::too_few_options(options.len()));
            }
            check_option_texts(options)?;
        }

        Ok(Self { question, options })
    }
}

fn check_option_texts(options: &[String]) -> Result<(), ApiError> {
    match options.iter().position(|text| text.trim().is_empty()) {
        Some(index) => Err(error::blank_option(index)),
        None => Ok(()),
    }
}
