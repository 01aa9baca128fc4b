use crate::*;
use num_enum::TryFromPrimitive;

/// The plaintext a voter encrypts before submitting a ballot
#[derive(Serialize, Deserialize, TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum Choice {
    No = 0,
    Yes = 1,
}

impl From<Choice> for u64 {
    fn from(choice: Choice) -> Self {
        choice as u64
    }
}

/// An encrypted ballot as submitted by a voter
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Ballot {
    pub poll_id: PollId,

    /// Encrypted choice, 0 for no and 1 for yes
    pub ciphertext: Handle,

    /// Proof binding `ciphertext` to the submitter and this ledger's context
    pub proof: InputProof,
}

impl Ballot {
    pub fn new(poll_id: PollId, ciphertext: Handle, proof: InputProof) -> Self {
        Ballot {
            poll_id,
            ciphertext,
            proof,
        }
    }
}

/// Proof that `voter` voted in a poll.
///
/// A record exists only once its ballot has been admitted and is never
/// removed or replaced, so its presence is the "has voted" flag.
#[derive(Clone, Debug)]
pub struct VoteRecord {
    pub(crate) voter: Identity,
    pub(crate) choice_handle: Handle,
}

impl VoteRecord {
    pub fn voter(&self) -> &Identity {
        &self.voter
    }

    /// The voter's encrypted choice; only the voter may decrypt it
    pub fn choice_handle(&self) -> &Handle {
        &self.choice_handle
    }
}

impl<S: ArithmeticService> Ledger<S> {
    /// Admit a ballot from `caller`.
    ///
    /// Rejections happen in this order: unknown poll, duplicate voter, bad
    /// proof. The choice is folded into both tallies before anything is
    /// committed, so a failing service call leaves the ledger untouched.
    pub fn vote(&mut self, caller: &Identity, ballot: Ballot) -> Result<(), Error> {
        let Ballot {
            poll_id,
            ciphertext,
            proof,
        } = ballot;

        let current = self.store.get_poll(poll_id)?.tallies();

        if self.store.get_vote_record(poll_id, caller).is_some() {
            log::warn!("rejected duplicate ballot from {} in poll {}", caller, poll_id);
            return Err(Error::AlreadyVoted {
                poll_id,
                voter: *caller,
            });
        }

        let binding = InputBinding {
            context: self.context,
            submitter: *caller,
        };
        self.service
            .verify_and_bind(&ciphertext, &proof, &binding)
            .map_err(|e| match e {
                ServiceError::InvalidProof | ServiceError::UnknownHandle(_) => {
                    log::warn!("rejected ballot from {} in poll {}: {}", caller, poll_id, e);
                    Error::InvalidProof
                }
                e => e.into(),
            })?;

        let yes_increment = self.service.homomorphic_select_bit(&ciphertext)?;
        let no_increment = self.service.homomorphic_complement(&yes_increment)?;
        let yes_tally = self.service.homomorphic_add(&current.yes, &yes_increment)?;
        let no_tally = self.service.homomorphic_add(&current.no, &no_increment)?;
        log::debug!("poll {} tallies now {} / {}", poll_id, yes_tally, no_tally);

        self.store.commit_ballot(AdmittedBallot {
            poll_id,
            voter: *caller,
            choice_handle: ciphertext,
            yes_tally,
            no_tally,
        });

        log::info!("ballot from {} admitted to poll {}", caller, poll_id);
        self.emit(Event::VoteAdmitted {
            poll_id,
            voter: *caller,
        });

        Ok(())
    }
}
