use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OptionId, PollId, UserId, VoteId};
use crate::error::{self, ApiError};

/// One user's choice on one poll. Never updated once recorded.
#[derive(Clone, Debug, Serialize)]
pub struct Vote {
    pub id: VoteId,
    pub poll_id: PollId,
    pub user_id: UserId,
    pub option_id: OptionId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct UnvalidatedCastVote {
    #[serde(rename = "optionId")]
    pub option_id: Option<i32>,
}

#[derive(Debug)]
pub struct CastVote {
    pub option_id: OptionId,
}

impl TryFrom<UnvalidatedCastVote> for CastVote {
    type Error = ApiError;
    fn try_from(value: UnvalidatedCastVote) -> Result<Self, Self::Error> {
        match value.option_id {
            Some(id) => Ok(Self { option_id: OptionId(id) }),
            None => Err(error::missing_option_id()),
        }
    }
}
