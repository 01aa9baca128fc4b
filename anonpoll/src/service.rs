use crate::*;
use ed25519_dalek::SecretKey;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors reported by an arithmetic service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("submission proof rejected")]
    InvalidProof,

    #[error("decryption of {0} refused")]
    Unauthorized(Handle),

    #[error("unknown handle {0}")]
    UnknownHandle(Handle),

    #[error("{0}")]
    Unavailable(String),
}

/// What a submission proof must bind a ciphertext to
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InputBinding {
    pub context: ContextId,
    pub submitter: Identity,
}

/// Opaque proof accompanying a submitted ciphertext
///
/// Its contents only mean something to the service that issued it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InputProof(pub Vec<u8>);

impl InputProof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The external encrypted-arithmetic engine.
///
/// The ledger never sees plaintext: it asks the service to verify submitted
/// ciphertexts, combine handles, and decrypt handles the gate has authorized.
/// Every call is synchronous and any error aborts the calling operation.
pub trait ArithmeticService {
    /// Check that `proof` binds `ciphertext` to the submitter and context in `binding`
    fn verify_and_bind(
        &self,
        ciphertext: &Handle,
        proof: &InputProof,
        binding: &InputBinding,
    ) -> Result<(), ServiceError>;

    /// A fresh encryption of zero for the given context
    fn zero_handle(&self, context: ContextId) -> Result<Handle, ServiceError>;

    /// Encrypted `a + b`
    fn homomorphic_add(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError>;

    /// Encrypted `1 - bit`
    fn homomorphic_complement(&self, bit: &Handle) -> Result<Handle, ServiceError>;

    /// Encrypted `value != 0 ? 1 : 0`
    fn homomorphic_select_bit(&self, value: &Handle) -> Result<Handle, ServiceError>;

    /// Decrypt for a single identity the caller has already authorized
    fn decrypt_private(&self, handle: &Handle, authorized: &Identity) -> Result<u64, ServiceError>;

    /// Decrypt a handle that has been opened for public disclosure
    fn decrypt_public(&self, handle: &Handle) -> Result<u64, ServiceError>;
}

impl<T: ArithmeticService + ?Sized> ArithmeticService for Arc<T> {
    fn verify_and_bind(
        &self,
        ciphertext: &Handle,
        proof: &InputProof,
        binding: &InputBinding,
    ) -> Result<(), ServiceError> {
        (**self).verify_and_bind(ciphertext, proof, binding)
    }

    fn zero_handle(&self, context: ContextId) -> Result<Handle, ServiceError> {
        (**self).zero_handle(context)
    }

    fn homomorphic_add(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError> {
        (**self).homomorphic_add(a, b)
    }

    fn homomorphic_complement(&self, bit: &Handle) -> Result<Handle, ServiceError> {
        (**self).homomorphic_complement(bit)
    }

    fn homomorphic_select_bit(&self, value: &Handle) -> Result<Handle, ServiceError> {
        (**self).homomorphic_select_bit(value)
    }

    fn decrypt_private(&self, handle: &Handle, authorized: &Identity) -> Result<u64, ServiceError> {
        (**self).decrypt_private(handle, authorized)
    }

    fn decrypt_public(&self, handle: &Handle) -> Result<u64, ServiceError> {
        (**self).decrypt_public(handle)
    }
}

/// Operations of the in-memory engine, used to inject faults
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    VerifyAndBind,
    Zero,
    Add,
    Complement,
    SelectBit,
    DecryptPrivate,
    DecryptPublic,
}

/// Attestation signed by the engine's input verifier when a client encrypts a value
#[derive(Serialize, Deserialize, Clone, Debug)]
struct InputAttestation {
    verifier: Identity,
    handle: Handle,
    binding: InputBinding,
}

impl Signable for InputAttestation {
    fn signer(&self) -> Identity {
        self.verifier
    }
}

#[derive(Default)]
struct MemState {
    values: HashMap<Handle, u64>,
    counter: u64,
    faults: HashSet<Operation>,
}

/// An in-memory stand-in for the encrypted-arithmetic engine
///
/// Values are kept in the clear inside the engine, which is fine for tests and
/// local simulation: the ledger still only ever handles [`Handle`]s. Submission
/// proofs are ed25519 attestations from the engine's own input verifier key.
pub struct MemArithmetic {
    verifier_secret: SecretKey,
    verifier: Identity,
    state: Mutex<MemState>,
}

impl MemArithmetic {
    pub fn new() -> Self {
        let (verifier_secret, verifier_public) = generate_keypair();
        MemArithmetic {
            verifier_secret,
            verifier: verifier_public.into(),
            state: Mutex::new(MemState::default()),
        }
    }

    /// The identity that signs input attestations
    pub fn verifier(&self) -> Identity {
        self.verifier
    }

    /// Encrypt `value` client-side, producing a handle and a proof bound to `binding`
    pub fn encrypt_input(
        &self,
        value: u64,
        binding: &InputBinding,
    ) -> Result<(Handle, InputProof), ServiceError> {
        let handle = {
            let mut state = self.lock()?;
            Self::store(&mut state, b"input", value)
        };

        let attestation = InputAttestation {
            verifier: self.verifier,
            handle: handle.clone(),
            binding: binding.clone(),
        };
        let signed = Signed::sign(&self.verifier_secret, attestation)
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        let proof = serde_cbor::to_vec(&signed)
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        Ok((handle, InputProof(proof)))
    }

    /// Make every subsequent call of `op` fail with `Unavailable`
    pub fn inject_fault(&self, op: Operation) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.insert(op);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Unavailable("engine state poisoned".to_string()))
    }

    fn begin(&self, op: Operation) -> Result<MutexGuard<'_, MemState>, ServiceError> {
        let state = self.lock()?;
        if state.faults.contains(&op) {
            return Err(ServiceError::Unavailable(format!("{:?} failed", op)));
        }
        Ok(state)
    }

    fn value(state: &MemState, handle: &Handle) -> Result<u64, ServiceError> {
        state
            .values
            .get(handle)
            .copied()
            .ok_or_else(|| ServiceError::UnknownHandle(handle.clone()))
    }

    fn store(state: &mut MemState, tag: &[u8], value: u64) -> Handle {
        state.counter += 1;

        let mut hasher = Sha256::new();
        hasher.update(tag);
        hasher.update(&state.counter.to_le_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        let handle = Handle::from_array(bytes);

        state.values.insert(handle.clone(), value);
        handle
    }
}

impl Default for MemArithmetic {
    fn default() -> Self {
        MemArithmetic::new()
    }
}

impl ArithmeticService for MemArithmetic {
    fn verify_and_bind(
        &self,
        ciphertext: &Handle,
        proof: &InputProof,
        binding: &InputBinding,
    ) -> Result<(), ServiceError> {
        let state = self.begin(Operation::VerifyAndBind)?;

        let signed: Signed<InputAttestation> =
            serde_cbor::from_slice(proof.as_bytes()).map_err(|_| ServiceError::InvalidProof)?;
        if signed.verifier != self.verifier || signed.verify_signature().is_err() {
            return Err(ServiceError::InvalidProof);
        }
        if signed.handle != *ciphertext || signed.binding != *binding {
            return Err(ServiceError::InvalidProof);
        }
        Self::value(&state, ciphertext)?;

        Ok(())
    }

    fn zero_handle(&self, context: ContextId) -> Result<Handle, ServiceError> {
        let mut state = self.begin(Operation::Zero)?;
        Ok(Self::store(&mut state, context.as_bytes(), 0))
    }

    fn homomorphic_add(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError> {
        let mut state = self.begin(Operation::Add)?;
        let sum = Self::value(&state, a)?.wrapping_add(Self::value(&state, b)?);
        Ok(Self::store(&mut state, b"add", sum))
    }

    fn homomorphic_complement(&self, bit: &Handle) -> Result<Handle, ServiceError> {
        let mut state = self.begin(Operation::Complement)?;
        let complement = 1u64.saturating_sub(Self::value(&state, bit)?);
        Ok(Self::store(&mut state, b"complement", complement))
    }

    fn homomorphic_select_bit(&self, value: &Handle) -> Result<Handle, ServiceError> {
        let mut state = self.begin(Operation::SelectBit)?;
        let bit = if Self::value(&state, value)? != 0 { 1 } else { 0 };
        Ok(Self::store(&mut state, b"select", bit))
    }

    fn decrypt_private(&self, handle: &Handle, authorized: &Identity) -> Result<u64, ServiceError> {
        let state = self.begin(Operation::DecryptPrivate)?;
        log::debug!("private decryption of {} for {}", handle, authorized);
        Self::value(&state, handle)
    }

    fn decrypt_public(&self, handle: &Handle) -> Result<u64, ServiceError> {
        let state = self.begin(Operation::DecryptPublic)?;
        log::debug!("public decryption of {}", handle);
        Self::value(&state, handle)
    }
}
