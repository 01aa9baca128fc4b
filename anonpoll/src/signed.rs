use crate::*;
use ed25519_dalek::ExpandedSecretKey;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use ed25519_dalek::Signature;
use serde::Serialize;
use std::ops::Deref;

/// A payload that can be signed by an identity.
///
/// The signed bytes are the canonical CBOR encoding of the payload, so the
/// payload type must serialize deterministically (no hash maps).
///
/// This trait should be considered sealed and should not be implemented outside this crate
#[doc(hidden)]
pub trait Signable: Serialize {
    /// The identity expected to have signed this payload
    fn signer(&self) -> Identity;

    fn as_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(&self)?)
    }
}

/// A generic signed payload
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Signed<T: Signable> {
    pub tx: T,

    #[serde(with = "EdSignatureHex")]
    pub sig: Signature,
}

impl<T: Signable> Signed<T> {
    /// Sign a payload, producing a Signed<T>
    pub fn sign(secret: &SecretKey, payload: T) -> Result<Self, Error> {
        let public_key = PublicKey::from(secret);
        if Identity::from(public_key) != payload.signer() {
            return Err(Error::MismatchedPublicKeys);
        }

        let serialized = payload.as_bytes()?;

        let expanded: ExpandedSecretKey = secret.into();
        let signature = expanded.sign(&serialized, &public_key);

        Ok(Signed {
            tx: payload,
            sig: signature,
        })
    }

    /// Verify the signature against the payload's signer
    pub fn verify_signature(&self) -> Result<(), AuthorizationError> {
        let serialized = self
            .tx
            .as_bytes()
            .map_err(|_| AuthorizationError::BadSignature)?;

        self.tx
            .signer()
            .verify(&serialized, &self.sig)
            .map_err(|_| AuthorizationError::BadSignature)
    }

    /// Get the inner unsigned payload
    pub fn inner(&self) -> &T {
        &self.tx
    }
}

impl<T: Signable> AsRef<T> for Signed<T> {
    fn as_ref(&self) -> &T {
        &self.tx
    }
}

impl<T: Signable> Deref for Signed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, Clone)]
    struct Note {
        author: Identity,
        body: String,
    }

    impl Signable for Note {
        fn signer(&self) -> Identity {
            self.author
        }
    }

    #[test]
    fn sign_and_verify() {
        let (secret, public) = generate_keypair();
        let (bad_secret, _bad_public) = generate_keypair();

        let note = Note {
            author: public.into(),
            body: "hello".to_string(),
        };

        // Signing with the wrong key should fail
        assert!(matches!(
            Signed::sign(&bad_secret, note.clone()),
            Err(Error::MismatchedPublicKeys)
        ));

        let signed = Signed::sign(&secret, note).unwrap();
        signed.verify_signature().unwrap();
        assert_eq!(signed.body, "hello");

        // Tampering with the payload breaks the signature
        let mut tampered = signed.clone();
        tampered.tx.body = "goodbye".to_string();
        assert_eq!(
            tampered.verify_signature(),
            Err(AuthorizationError::BadSignature)
        );
    }
}
