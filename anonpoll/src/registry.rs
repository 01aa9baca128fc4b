use crate::*;

/// Sequential poll identifier, starting at 0
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollId(pub u64);

impl PollId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PollId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PollId {
    fn from(id: u64) -> Self {
        PollId(id)
    }
}

/// A yes/no poll.
///
/// The question and creator never change. `total_votes` and the two tally
/// handles only move forward, and only through [`Ledger::vote`].
#[derive(Clone, Debug)]
pub struct Poll {
    pub(crate) id: PollId,
    pub(crate) question: String,
    pub(crate) creator: Identity,
    pub(crate) total_votes: u64,
    pub(crate) yes_tally: Handle,
    pub(crate) no_tally: Handle,
}

impl Poll {
    pub fn id(&self) -> PollId {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn creator(&self) -> &Identity {
        &self.creator
    }

    pub fn total_votes(&self) -> u64 {
        self.total_votes
    }

    /// The current tally handles
    pub fn tallies(&self) -> TallyPair {
        TallyPair {
            yes: self.yes_tally.clone(),
            no: self.no_tally.clone(),
        }
    }

    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            id: self.id,
            question: self.question.clone(),
            creator: self.creator,
            total_votes: self.total_votes,
            yes_tally: self.yes_tally.clone(),
            no_tally: self.no_tally.clone(),
        }
    }
}

/// Point-in-time view of a poll, as handed to callers
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PollSnapshot {
    pub id: PollId,
    pub question: String,
    pub creator: Identity,
    pub total_votes: u64,
    pub yes_tally: Handle,
    pub no_tally: Handle,
}

impl PollSnapshot {
    pub fn tallies(&self) -> TallyPair {
        TallyPair {
            yes: self.yes_tally.clone(),
            no: self.no_tally.clone(),
        }
    }
}

impl<S: ArithmeticService> Ledger<S> {
    /// Create a new poll owned by `caller` and return its id
    pub fn create_poll(&mut self, caller: &Identity, question: &str) -> Result<PollId, Error> {
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }
        if let Some(limit) = self.config.max_question_len {
            let len = question.chars().count();
            if len > limit {
                return Err(Error::InvalidInput(format!(
                    "question is {} characters, the limit is {}",
                    len, limit
                )));
            }
        }

        let yes_tally = self.service.zero_handle(self.context)?;
        let no_tally = self.service.zero_handle(self.context)?;

        let id = self.store.next_poll_id();
        self.store.push_poll(Poll {
            id,
            question: question.to_owned(),
            creator: *caller,
            total_votes: 0,
            yes_tally,
            no_tally,
        });

        log::info!("poll {} created by {}", id, caller);
        self.emit(Event::PollCreated {
            poll_id: id,
            creator: *caller,
        });

        Ok(id)
    }

    /// Total number of polls ever created
    pub fn poll_count(&self) -> u64 {
        self.store.poll_count()
    }

    pub fn get_poll(&self, poll_id: PollId) -> Result<PollSnapshot, Error> {
        Ok(self.store.get_poll(poll_id)?.snapshot())
    }

    /// Every poll, in id order
    pub fn list_polls(&self) -> Vec<PollSnapshot> {
        self.store.polls().iter().map(Poll::snapshot).collect()
    }

    /// Whether `voter` has a ballot in the poll
    pub fn has_voted(&self, poll_id: PollId, voter: &Identity) -> Result<bool, Error> {
        self.store.get_poll(poll_id)?;
        Ok(self.store.get_vote_record(poll_id, voter).is_some())
    }
}
