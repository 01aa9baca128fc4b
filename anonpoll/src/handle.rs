use crate::*;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::convert::TryInto;
use std::str::FromStr;

/// Encrypted value handle
///
/// An opaque reference to ciphertext state held by the arithmetic service. A
/// handle carries no plaintext and no access rights of its own: who may decrypt
/// it is decided by the [`Acl`]. Handles are deliberately not `Copy`; the only
/// things that can be done with one are the operations delegated to an
/// [`ArithmeticService`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle([u8; 32]);

impl Handle {
    /// Wrap raw handle bytes issued by an arithmetic service
    pub fn from_array(bytes: [u8; 32]) -> Self {
        Handle(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Handle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| Error::BadHandle(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::BadHandle(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Handle(bytes))
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Handle({})", self)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Handle::from_str(&s).map_err(de::Error::custom)
    }
}

impl Serialize for Handle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// The pair of tally handles a poll exposes for aggregate disclosure
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TallyPair {
    pub yes: Handle,
    pub no: Handle,
}
