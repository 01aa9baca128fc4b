use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The confidential poll ledger.
///
/// Owns the committed state and the connection to the arithmetic service. The
/// registry, admission and decryption operations are implemented on this type
/// in their own modules. State-changing operations take `&mut self`, so they
/// run one at a time to completion.
pub struct Ledger<S: ArithmeticService> {
    pub(crate) service: S,
    pub(crate) context: ContextId,
    pub(crate) config: Config,
    pub(crate) store: MemStore,
}

impl<S: ArithmeticService> Ledger<S> {
    /// Create an empty ledger with the default configuration and a fresh context
    pub fn new(service: S) -> Self {
        Ledger {
            service,
            context: ContextId::new(),
            config: Config::default(),
            store: MemStore::default(),
        }
    }

    pub fn with_config(service: S, config: Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Ledger {
            service,
            context: ContextId::new(),
            config,
            store: MemStore::default(),
        })
    }

    /// The context submission proofs and decryption requests must be bound to
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// The signing domain for decryption requests
    pub fn domain(&self) -> Domain {
        Domain::new(&self.config.domain_name, self.context)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &MemStore {
        &self.store
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn events(&self) -> &[Event] {
        self.store.events()
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.store.push_event(event);
    }
}

/// A ledger shared between threads.
///
/// Writers are serialized behind the write lock; readers see the latest
/// committed state and never a half-applied vote.
pub struct SharedLedger<S: ArithmeticService> {
    inner: Arc<RwLock<Ledger<S>>>,
}

impl<S: ArithmeticService> Clone for SharedLedger<S> {
    fn clone(&self) -> Self {
        SharedLedger {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ArithmeticService> SharedLedger<S> {
    pub fn new(ledger: Ledger<S>) -> Self {
        SharedLedger {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, Ledger<S>>, Error> {
        self.inner
            .read()
            .map_err(|_| Error::ServiceUnavailable("ledger lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Ledger<S>>, Error> {
        self.inner
            .write()
            .map_err(|_| Error::ServiceUnavailable("ledger lock poisoned".to_owned()))
    }

    pub fn create_poll(&self, caller: &Identity, question: &str) -> Result<PollId, Error> {
        self.write()?.create_poll(caller, question)
    }

    pub fn vote(&self, caller: &Identity, ballot: Ballot) -> Result<(), Error> {
        self.write()?.vote(caller, ballot)
    }

    pub fn poll_count(&self) -> Result<u64, Error> {
        Ok(self.read()?.poll_count())
    }

    pub fn get_poll(&self, poll_id: PollId) -> Result<PollSnapshot, Error> {
        self.read()?.get_poll(poll_id)
    }

    pub fn list_polls(&self) -> Result<Vec<PollSnapshot>, Error> {
        Ok(self.read()?.list_polls())
    }

    pub fn has_voted(&self, poll_id: PollId, voter: &Identity) -> Result<bool, Error> {
        self.read()?.has_voted(poll_id, voter)
    }

    pub fn my_vote(&self, caller: &Identity, poll_id: PollId) -> Result<Handle, Error> {
        self.read()?.my_vote(caller, poll_id)
    }

    pub fn user_decrypt(
        &self,
        request: &Signed<DecryptionRequest>,
        now: DateTime<Utc>,
    ) -> Result<IndexMap<Handle, u64>, Error> {
        self.read()?.user_decrypt(request, now)
    }

    pub fn public_decrypt(&self, tallies: &TallyPair) -> Result<Disclosure, Error> {
        self.read()?.public_decrypt(tallies)
    }

    pub fn disclose(&self, poll_id: PollId) -> Result<Disclosure, Error> {
        self.read()?.disclose(poll_id)
    }
}
