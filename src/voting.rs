mod ballot;
mod id;
mod poll;
mod poll_result;
mod user;

pub use ballot::{CastVote, UnvalidatedCastVote, Vote};
pub use id::{OptionId, PollId, UserId, VoteId};
pub use poll::{
    CreatePollSettings, Poll, PollOption, UnvalidatedCreatePollSettings,
    UnvalidatedUpdatePollSettings, UpdatePollSettings, MIN_OPTIONS,
};
pub use poll_result::{OptionTally, PollResult};
pub use user::{Credentials, Registration, UnvalidatedCredentials, UnvalidatedRegistration, User};
