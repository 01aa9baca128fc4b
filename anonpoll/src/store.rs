use crate::*;
use std::collections::BTreeMap;

/// Read access to committed ledger state
pub trait Store {
    /// Number of polls ever created
    fn poll_count(&self) -> u64;

    /// Get a poll by id
    fn get_poll(&self, id: PollId) -> Result<&Poll, Error>;

    /// Get the vote record of `voter` in a poll, if they voted
    fn get_vote_record(&self, poll_id: PollId, voter: &Identity) -> Option<&VoteRecord>;

    /// The decryption access-control list
    fn acl(&self) -> &Acl;
}

/// Everything a successful vote changes, committed in one step
pub(crate) struct AdmittedBallot {
    pub poll_id: PollId,
    pub voter: Identity,
    pub choice_handle: Handle,
    pub yes_tally: Handle,
    pub no_tally: Handle,
}

/// A simple in-memory store.
///
/// Polls are kept in creation order so a poll's id is its index. Vote records
/// are keyed by `(poll, voter)`, which makes a second record for the same pair
/// unrepresentable.
#[derive(Default, Clone)]
pub struct MemStore {
    polls: Vec<Poll>,
    votes: BTreeMap<(PollId, Identity), VoteRecord>,
    acl: Acl,
    events: Vec<Event>,
}

impl MemStore {
    /// All polls in id order
    pub fn polls(&self) -> &[Poll] {
        &self.polls
    }

    /// Every notification emitted so far, oldest first
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Vote records of a poll in voter order
    pub fn vote_records(&self, poll_id: PollId) -> impl Iterator<Item = &VoteRecord> {
        self.votes
            .iter()
            .filter(move |((id, _), _)| *id == poll_id)
            .map(|(_, record)| record)
    }

    pub(crate) fn next_poll_id(&self) -> PollId {
        PollId(self.polls.len() as u64)
    }

    pub(crate) fn push_poll(&mut self, poll: Poll) {
        debug_assert_eq!(poll.id, self.next_poll_id());

        self.acl.open_tally(
            poll.yes_tally.clone(),
            TallyGrant::new(poll.id, TallySide::Yes, 0),
        );
        self.acl.open_tally(
            poll.no_tally.clone(),
            TallyGrant::new(poll.id, TallySide::No, 0),
        );
        self.polls.push(poll);
    }

    /// Apply an admitted ballot. Callers must have checked that the poll exists
    /// and the voter has no record yet.
    pub(crate) fn commit_ballot(&mut self, ballot: AdmittedBallot) {
        let AdmittedBallot {
            poll_id,
            voter,
            choice_handle,
            yes_tally,
            no_tally,
        } = ballot;

        let poll = &mut self.polls[poll_id.index()];
        poll.total_votes += 1;
        poll.yes_tally = yes_tally.clone();
        poll.no_tally = no_tally.clone();
        let total_votes = poll.total_votes;

        self.acl.allow(choice_handle.clone(), voter);
        self.acl.open_tally(
            yes_tally,
            TallyGrant::new(poll_id, TallySide::Yes, total_votes),
        );
        self.acl.open_tally(
            no_tally,
            TallyGrant::new(poll_id, TallySide::No, total_votes),
        );

        let previous = self.votes.insert(
            (poll_id, voter),
            VoteRecord {
                voter,
                choice_handle,
            },
        );
        debug_assert!(previous.is_none());
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }
}

impl Store for MemStore {
    fn poll_count(&self) -> u64 {
        self.polls.len() as u64
    }

    fn get_poll(&self, id: PollId) -> Result<&Poll, Error> {
        if id.0 >= self.poll_count() {
            return Err(Error::NotFound(id));
        }
        Ok(&self.polls[id.index()])
    }

    fn get_vote_record(&self, poll_id: PollId, voter: &Identity) -> Option<&VoteRecord> {
        self.votes.get(&(poll_id, *voter))
    }

    fn acl(&self) -> &Acl {
        &self.acl
    }
}
