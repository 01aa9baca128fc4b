use crate::*;
use std::collections::{BTreeMap, BTreeSet};

/// Which tally of a poll a handle holds
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TallySide {
    Yes,
    No,
}

/// Public-decryption grant on a tally handle
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TallyGrant {
    pub poll_id: PollId,
    pub side: TallySide,

    /// Number of ballots summed into the handle
    pub total_votes: u64,
}

impl TallyGrant {
    pub fn new(poll_id: PollId, side: TallySide, total_votes: u64) -> Self {
        TallyGrant {
            poll_id,
            side,
            total_votes,
        }
    }
}

/// Decryption access-control list.
///
/// Ballot handles are granted to exactly one identity, their voter. Tally
/// handles are opened to everyone. A handle never sits in both lists.
#[derive(Default, Clone, Debug)]
pub struct Acl {
    private: BTreeMap<Handle, BTreeSet<Identity>>,
    public: BTreeMap<Handle, TallyGrant>,
}

impl Acl {
    pub(crate) fn allow(&mut self, handle: Handle, identity: Identity) {
        debug_assert!(!self.public.contains_key(&handle));
        self.private.entry(handle).or_default().insert(identity);
    }

    pub(crate) fn open_tally(&mut self, handle: Handle, grant: TallyGrant) {
        debug_assert!(!self.private.contains_key(&handle));
        self.public.insert(handle, grant);
    }

    /// Whether `identity` may privately decrypt `handle`
    pub fn is_allowed(&self, handle: &Handle, identity: &Identity) -> bool {
        self.private
            .get(handle)
            .map_or(false, |allowed| allowed.contains(identity))
    }

    /// The public grant on a tally handle, if it has been opened
    pub fn public_grant(&self, handle: &Handle) -> Option<&TallyGrant> {
        self.public.get(handle)
    }

    pub fn is_publicly_decryptable(&self, handle: &Handle) -> bool {
        self.public.contains_key(handle)
    }
}
