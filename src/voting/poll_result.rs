use serde::Serialize;

use super::id::PollId;
use super::poll::Poll;

#[derive(Debug, Serialize)]
pub struct PollResult {
    pub poll_id: PollId,
    pub question: String,
    pub results: Vec<OptionTally>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub option: String,
    pub votes: i32,
}

impl PollResult {
    pub fn total_votes(&self) -> i64 {
        self.results.iter().map(|tally| i64::from(tally.votes)).sum()
    }
}

impl From<Poll> for PollResult {
    fn from(poll: Poll) -> Self {
        PollResult {
            poll_id: poll.id,
            question: poll.question,
            results: poll
                .options
                .into_iter()
                .map(|option| OptionTally {
                    option: option.text,
                    votes: option.vote_count,
                })
                .collect(),
        }
    }
}
