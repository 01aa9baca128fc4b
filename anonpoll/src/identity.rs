use crate::*;
use ed25519_dalek::PublicKey;
use ed25519_dalek::Signature;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// The identity behind every call into the ledger.
///
/// Identities are ed25519 public keys supplied by the signing layer. The ledger
/// never holds secret keys.
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub struct Identity(#[serde(with = "EdPublicKeyHex")] PublicKey);

impl Identity {
    pub fn new(public_key: PublicKey) -> Self {
        Identity(public_key)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Verify a signature made by this identity over `message`
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), ed25519_dalek::SignatureError> {
        self.0.verify_strict(message, signature)
    }
}

impl From<PublicKey> for Identity {
    fn from(public_key: PublicKey) -> Self {
        Identity(public_key)
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| Error::BadIdentity(e.to_string()))?;
        let public_key =
            PublicKey::from_bytes(&bytes).map_err(|e| Error::BadIdentity(e.to_string()))?;
        Ok(Identity(public_key))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Identity({})", self)
    }
}

// PublicKey has no Hash or Ord of its own
impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

/// Identifies one deployed ledger.
///
/// Submission proofs and decryption requests are bound to a context so they
/// cannot be replayed against another deployment.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        ContextId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ContextId {
    fn default() -> Self {
        ContextId::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
