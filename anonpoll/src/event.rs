use crate::*;

/// Notifications emitted by state-changing operations.
///
/// Events carry identities and poll ids only. A vote notification never says
/// which way the ballot went.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Event {
    PollCreated { poll_id: PollId, creator: Identity },
    VoteAdmitted { poll_id: PollId, voter: Identity },
}

impl Event {
    pub fn poll_id(&self) -> PollId {
        match self {
            Event::PollCreated { poll_id, .. } => *poll_id,
            Event::VoteAdmitted { poll_id, .. } => *poll_id,
        }
    }
}
