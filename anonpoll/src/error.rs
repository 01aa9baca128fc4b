use crate::*;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("anonpoll: invalid input: {0}")]
    InvalidInput(String),

    #[error("anonpoll: poll {0} not found")]
    NotFound(PollId),

    #[error("anonpoll: {voter} has already voted in poll {poll_id}")]
    AlreadyVoted { poll_id: PollId, voter: Identity },

    #[error("anonpoll: submission proof failed to verify")]
    InvalidProof,

    #[error("anonpoll: no vote cast in poll {0}")]
    NoVoteCast(PollId),

    #[error("anonpoll: unauthorized decryption: {0}")]
    UnauthorizedDecryption(#[from] AuthorizationError),

    #[error("anonpoll: arithmetic service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("anonpoll: anonymity set too small: need {required} ballots, found {actual}")]
    AnonymitySetTooSmall { required: u64, actual: u64 },

    #[error("anonpoll: mismatched public keys")]
    MismatchedPublicKeys,

    #[error("anonpoll: CBOR error serializing request: {0}")]
    Serialization(#[from] serde_cbor::Error),

    #[error("anonpoll: invalid identity: {0}")]
    BadIdentity(String),

    #[error("anonpoll: invalid handle: {0}")]
    BadHandle(String),

    #[error("anonpoll: configuration error: {0}")]
    Config(String),
}

/// Reasons a private decryption request is refused by the gate
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("request signature does not verify against the requester")]
    BadSignature,

    #[error("requester is not entitled to handle {0}")]
    NotEntitled(Handle),

    #[error("request expired")]
    Expired,

    #[error("request is not valid yet")]
    NotYetValid,

    #[error("request validity window of {0} days is not allowed")]
    InvalidWindow(u32),

    #[error("request scope does not include context {0}")]
    OutOfScope(ContextId),

    #[error("request domain does not match this ledger")]
    DomainMismatch,

    #[error("request names no handles")]
    NoHandles,

    #[error("handle {0} is not publicly decryptable")]
    NotPubliclyDecryptable(Handle),

    #[error("handle {0} has been superseded by a later tally")]
    Superseded(Handle),
}

impl From<ServiceError> for Error {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidProof => Error::InvalidProof,
            ServiceError::Unauthorized(handle) => {
                Error::UnauthorizedDecryption(AuthorizationError::NotEntitled(handle))
            }
            ServiceError::UnknownHandle(handle) => {
                Error::ServiceUnavailable(format!("unknown handle {}", handle))
            }
            ServiceError::Unavailable(msg) => Error::ServiceUnavailable(msg),
        }
    }
}
