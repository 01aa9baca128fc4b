use crate::*;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

/// Signing domain a decryption request is bound to.
///
/// Plays the part of a typed-data domain separator: a request signed for one
/// deployment is meaningless to another.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub context: ContextId,
}

impl Domain {
    pub const VERSION: &'static str = "1";

    pub fn new(name: &str, context: ContextId) -> Self {
        Domain {
            name: name.to_owned(),
            version: Domain::VERSION.to_owned(),
            context,
        }
    }
}

/// A request from one identity to privately decrypt a set of handles.
///
/// Built with [`DecryptionRequestBuilder`], then signed with
/// [`Signed::sign`]. The signed bytes cover every field, including the
/// domain, the validity window and the scope.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DecryptionRequest {
    domain: Domain,
    requester: Identity,
    handles: Vec<Handle>,
    scope: Vec<ContextId>,
    start: DateTime<Utc>,
    duration_days: u32,
}

impl DecryptionRequest {
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn requester(&self) -> &Identity {
        &self.requester
    }

    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    pub fn scope(&self) -> &[ContextId] {
        &self.scope
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    /// First instant at which the request is no longer valid
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.start + Duration::days(i64::from(self.duration_days))
    }

    /// Check the validity window against `now`
    pub fn check_window(
        &self,
        now: DateTime<Utc>,
        max_days: u32,
    ) -> Result<(), AuthorizationError> {
        if self.duration_days == 0 || self.duration_days > max_days {
            return Err(AuthorizationError::InvalidWindow(self.duration_days));
        }
        if now < self.start {
            return Err(AuthorizationError::NotYetValid);
        }
        if now >= self.expires_at() {
            return Err(AuthorizationError::Expired);
        }
        Ok(())
    }
}

impl Signable for DecryptionRequest {
    fn signer(&self) -> Identity {
        self.requester
    }
}

/// Builds a [`DecryptionRequest`].
///
/// Defaults: scope is the domain's own context, the window starts now and lasts
/// one day.
pub struct DecryptionRequestBuilder {
    domain: Domain,
    requester: Identity,
    handles: Vec<Handle>,
    scope: Vec<ContextId>,
    start: Option<DateTime<Utc>>,
    duration_days: u32,
}

impl DecryptionRequestBuilder {
    pub fn new(domain: Domain, requester: Identity) -> Self {
        DecryptionRequestBuilder {
            domain,
            requester,
            handles: vec![],
            scope: vec![],
            start: None,
            duration_days: 1,
        }
    }

    pub fn handle(mut self, handle: Handle) -> Self {
        if !self.handles.contains(&handle) {
            self.handles.push(handle);
        }
        self
    }

    pub fn handles<I: IntoIterator<Item = Handle>>(self, handles: I) -> Self {
        handles.into_iter().fold(self, |builder, h| builder.handle(h))
    }

    pub fn scope(mut self, context: ContextId) -> Self {
        if !self.scope.contains(&context) {
            self.scope.push(context);
        }
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn valid_for_days(mut self, days: u32) -> Self {
        self.duration_days = days;
        self
    }

    pub fn build(self) -> Result<DecryptionRequest, Error> {
        if self.handles.is_empty() {
            return Err(AuthorizationError::NoHandles.into());
        }
        if self.duration_days == 0 || self.duration_days > MAX_REQUEST_VALIDITY_DAYS {
            return Err(AuthorizationError::InvalidWindow(self.duration_days).into());
        }

        let scope = if self.scope.is_empty() {
            vec![self.domain.context]
        } else {
            self.scope
        };

        Ok(DecryptionRequest {
            domain: self.domain,
            requester: self.requester,
            handles: self.handles,
            scope,
            start: self.start.unwrap_or_else(Utc::now),
            duration_days: self.duration_days,
        })
    }
}

/// Check a signed private-decryption request against committed state.
///
/// Pure function of the request, the store and `now`: verifies the
/// requester's signature, their entitlement to every handle, the validity
/// window, the domain and the scope.
pub fn authorize_request<St: Store>(
    request: &Signed<DecryptionRequest>,
    store: &St,
    domain: &Domain,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<(), AuthorizationError> {
    if request.handles.is_empty() {
        return Err(AuthorizationError::NoHandles);
    }

    request.verify_signature()?;

    for handle in request.handles.iter() {
        if !store.acl().is_allowed(handle, &request.requester) {
            return Err(AuthorizationError::NotEntitled(handle.clone()));
        }
    }

    request.check_window(now, config.max_request_validity_days)?;

    if request.domain != *domain {
        return Err(AuthorizationError::DomainMismatch);
    }
    if !request.scope.contains(&domain.context) {
        return Err(AuthorizationError::OutOfScope(domain.context));
    }

    Ok(())
}

/// Result of an aggregate disclosure
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Disclosure {
    pub poll_id: PollId,
    pub num_yes: u64,
    pub num_no: u64,

    /// Ballots covered by the disclosed tallies
    pub total_votes: u64,
}

impl<S: ArithmeticService> Ledger<S> {
    /// The caller's own encrypted ballot in a poll
    pub fn my_vote(&self, caller: &Identity, poll_id: PollId) -> Result<Handle, Error> {
        self.store.get_poll(poll_id)?;
        self.store
            .get_vote_record(poll_id, caller)
            .map(|record| record.choice_handle.clone())
            .ok_or(Error::NoVoteCast(poll_id))
    }

    /// Answer a signed private-decryption request.
    ///
    /// Returns the plaintext of every requested handle, in request order. Only
    /// the requester receives it, and nothing on the ledger changes.
    pub fn user_decrypt(
        &self,
        request: &Signed<DecryptionRequest>,
        now: DateTime<Utc>,
    ) -> Result<IndexMap<Handle, u64>, Error> {
        let domain = self.domain();
        if let Err(e) = authorize_request(request, &self.store, &domain, &self.config, now) {
            log::warn!(
                "refused decryption request from {}: {}",
                request.requester,
                e
            );
            return Err(e.into());
        }

        let mut plaintexts = IndexMap::with_capacity(request.handles.len());
        for handle in request.handles.iter() {
            let value = self.service.decrypt_private(handle, &request.requester)?;
            plaintexts.insert(handle.clone(), value);
        }

        log::debug!(
            "answered decryption request from {} for {} handle(s)",
            request.requester,
            plaintexts.len()
        );
        Ok(plaintexts)
    }

    /// Disclose the yes/no counts behind a pair of tally handles.
    ///
    /// The handles may be the current pair of a poll or any earlier pair; the
    /// counts always add up to the number of ballots the pair covers. With a
    /// minimum anonymity set configured only the current pair is accepted,
    /// since the difference of two consecutive pairs is a single ballot.
    pub fn public_decrypt(&self, tallies: &TallyPair) -> Result<Disclosure, Error> {
        let acl = self.store.acl();
        let yes = acl
            .public_grant(&tallies.yes)
            .ok_or_else(|| AuthorizationError::NotPubliclyDecryptable(tallies.yes.clone()))?;
        let no = acl
            .public_grant(&tallies.no)
            .ok_or_else(|| AuthorizationError::NotPubliclyDecryptable(tallies.no.clone()))?;

        if yes.side != TallySide::Yes
            || no.side != TallySide::No
            || yes.poll_id != no.poll_id
            || yes.total_votes != no.total_votes
        {
            return Err(Error::InvalidInput(
                "handles are not the yes and no tallies of one poll".to_owned(),
            ));
        }

        let required = self.config.min_disclosure_ballots;
        if required > 0 {
            if yes.total_votes < required {
                return Err(Error::AnonymitySetTooSmall {
                    required,
                    actual: yes.total_votes,
                });
            }
            if self.store.get_poll(yes.poll_id)?.total_votes != yes.total_votes {
                return Err(AuthorizationError::Superseded(tallies.yes.clone()).into());
            }
        }

        let num_yes = self.service.decrypt_public(&tallies.yes)?;
        let num_no = self.service.decrypt_public(&tallies.no)?;
        debug_assert_eq!(num_yes + num_no, yes.total_votes);

        log::info!(
            "disclosed poll {} tallies over {} ballot(s)",
            yes.poll_id,
            yes.total_votes
        );

        Ok(Disclosure {
            poll_id: yes.poll_id,
            num_yes,
            num_no,
            total_votes: yes.total_votes,
        })
    }

    /// Disclose the current tallies of a poll
    pub fn disclose(&self, poll_id: PollId) -> Result<Disclosure, Error> {
        let tallies = self.store.get_poll(poll_id)?.tallies();
        self.public_decrypt(&tallies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SecretKey;
    use std::sync::Arc;

    struct Voter {
        secret: SecretKey,
        identity: Identity,
    }

    fn voter() -> Voter {
        let (secret, public) = generate_keypair();
        Voter {
            secret,
            identity: public.into(),
        }
    }

    struct Fixture {
        engine: Arc<MemArithmetic>,
        ledger: Ledger<Arc<MemArithmetic>>,
        poll: PollId,
    }

    fn fixture_with(config: Config) -> Fixture {
        let engine = Arc::new(MemArithmetic::new());
        let mut ledger = Ledger::with_config(engine.clone(), config).unwrap();
        let creator = voter();
        let poll = ledger.create_poll(&creator.identity, "Tea?").unwrap();
        Fixture {
            engine,
            ledger,
            poll,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Config::default())
    }

    fn cast(f: &mut Fixture, voter: &Voter, value: u64) -> Handle {
        let binding = InputBinding {
            context: f.ledger.context(),
            submitter: voter.identity,
        };
        let (handle, proof) = f.engine.encrypt_input(value, &binding).unwrap();
        f.ledger
            .vote(&voter.identity, Ballot::new(f.poll, handle.clone(), proof))
            .unwrap();
        handle
    }

    fn request(f: &Fixture, requester: &Voter, handle: Handle) -> DecryptionRequestBuilder {
        DecryptionRequestBuilder::new(f.ledger.domain(), requester.identity).handle(handle)
    }

    #[test]
    fn voter_decrypts_own_ballot() {
        let mut f = fixture();
        let alice = voter();
        cast(&mut f, &alice, 1);

        let handle = f.ledger.my_vote(&alice.identity, f.poll).unwrap();
        let req = request(&f, &alice, handle.clone()).build().unwrap();
        let signed = Signed::sign(&alice.secret, req).unwrap();

        let plaintexts = f.ledger.user_decrypt(&signed, Utc::now()).unwrap();
        assert_eq!(plaintexts.len(), 1);
        assert_eq!(plaintexts[&handle], 1);
    }

    #[test]
    fn my_vote_errors() {
        let mut f = fixture();
        let alice = voter();
        cast(&mut f, &alice, 1);

        assert!(matches!(
            f.ledger.my_vote(&voter().identity, f.poll),
            Err(Error::NoVoteCast(_))
        ));
        assert!(matches!(
            f.ledger.my_vote(&alice.identity, PollId(9)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn other_identities_cannot_decrypt_a_ballot() {
        let mut f = fixture();
        let (alice, bob) = (voter(), voter());
        let alice_ballot = cast(&mut f, &alice, 0);
        cast(&mut f, &bob, 1);

        // Bob signs a request for Alice's handle
        let req = request(&f, &bob, alice_ballot.clone()).build().unwrap();
        let signed = Signed::sign(&bob.secret, req).unwrap();
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::UnauthorizedDecryption(AuthorizationError::NotEntitled(h))) if h == alice_ballot
        ));

        // Bob cannot sign in Alice's name either
        let req = request(&f, &alice, alice_ballot).build().unwrap();
        assert!(matches!(
            Signed::sign(&bob.secret, req),
            Err(Error::MismatchedPublicKeys)
        ));
    }

    #[test]
    fn forged_signature_is_rejected() {
        let mut f = fixture();
        let (alice, bob) = (voter(), voter());
        let ballot = cast(&mut f, &alice, 0);

        let req = request(&f, &alice, ballot.clone()).build().unwrap();
        let mut signed = Signed::sign(&alice.secret, req).unwrap();

        // Re-point a valid signature at a request that widens the scope
        signed.tx.scope.push(ContextId::new());
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::UnauthorizedDecryption(AuthorizationError::BadSignature))
        ));

        // Or at another requester
        let req = request(&f, &alice, ballot).build().unwrap();
        let mut signed = Signed::sign(&alice.secret, req).unwrap();
        signed.tx.requester = bob.identity;
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::UnauthorizedDecryption(AuthorizationError::BadSignature))
        ));
    }

    #[test]
    fn validity_window_is_enforced() {
        let mut f = fixture();
        let alice = voter();
        let ballot = cast(&mut f, &alice, 1);
        let start = Utc::now();

        let req = request(&f, &alice, ballot.clone())
            .starting_at(start)
            .valid_for_days(2)
            .build()
            .unwrap();
        assert_eq!(req.expires_at(), start + Duration::days(2));
        let signed = Signed::sign(&alice.secret, req).unwrap();

        f.ledger
            .user_decrypt(&signed, start + Duration::hours(47))
            .unwrap();
        assert!(matches!(
            f.ledger.user_decrypt(&signed, start + Duration::days(2)),
            Err(Error::UnauthorizedDecryption(AuthorizationError::Expired))
        ));
        assert!(matches!(
            f.ledger.user_decrypt(&signed, start - Duration::seconds(1)),
            Err(Error::UnauthorizedDecryption(AuthorizationError::NotYetValid))
        ));
    }

    #[test]
    fn window_limits() {
        let mut f = fixture_with(Config {
            max_request_validity_days: 7,
            ..Config::default()
        });
        let alice = voter();
        let ballot = cast(&mut f, &alice, 1);

        assert!(matches!(
            request(&f, &alice, ballot.clone()).valid_for_days(0).build(),
            Err(Error::UnauthorizedDecryption(AuthorizationError::InvalidWindow(0)))
        ));
        assert!(matches!(
            request(&f, &alice, ballot.clone()).valid_for_days(366).build(),
            Err(Error::UnauthorizedDecryption(AuthorizationError::InvalidWindow(366)))
        ));

        // Buildable, but longer than this ledger accepts
        let req = request(&f, &alice, ballot).valid_for_days(30).build().unwrap();
        let signed = Signed::sign(&alice.secret, req).unwrap();
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::UnauthorizedDecryption(AuthorizationError::InvalidWindow(30)))
        ));
    }

    #[test]
    fn scope_and_domain_are_enforced() {
        let mut f = fixture();
        let alice = voter();
        let ballot = cast(&mut f, &alice, 1);

        // Scoped to a different deployment only
        let elsewhere = ContextId::new();
        let req = request(&f, &alice, ballot.clone())
            .scope(elsewhere)
            .build()
            .unwrap();
        assert_eq!(req.scope(), &[elsewhere]);
        let signed = Signed::sign(&alice.secret, req).unwrap();
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::UnauthorizedDecryption(AuthorizationError::OutOfScope(_)))
        ));

        // Scope lists several deployments including this one
        let req = request(&f, &alice, ballot.clone())
            .scope(elsewhere)
            .scope(f.ledger.context())
            .build()
            .unwrap();
        let signed = Signed::sign(&alice.secret, req).unwrap();
        f.ledger.user_decrypt(&signed, Utc::now()).unwrap();

        // Signed for another domain
        let domain = Domain::new("someone-else", f.ledger.context());
        let req = DecryptionRequestBuilder::new(domain, alice.identity)
            .handle(ballot)
            .build()
            .unwrap();
        let signed = Signed::sign(&alice.secret, req).unwrap();
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::UnauthorizedDecryption(AuthorizationError::DomainMismatch))
        ));
    }

    #[test]
    fn voters_cannot_privately_decrypt_tallies() {
        let mut f = fixture();
        let alice = voter();
        cast(&mut f, &alice, 1);
        let tallies = f.ledger.get_poll(f.poll).unwrap().tallies();

        let req = request(&f, &alice, tallies.yes).build().unwrap();
        let signed = Signed::sign(&alice.secret, req).unwrap();
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::UnauthorizedDecryption(AuthorizationError::NotEntitled(_)))
        ));
    }

    #[test]
    fn empty_requests_are_rejected() {
        let f = fixture();
        let alice = voter();
        assert!(matches!(
            DecryptionRequestBuilder::new(f.ledger.domain(), alice.identity).build(),
            Err(Error::UnauthorizedDecryption(AuthorizationError::NoHandles))
        ));
    }

    #[test]
    fn builder_deduplicates() {
        let f = fixture();
        let alice = voter();
        let h = Handle::from_array([3; 32]);
        let req = DecryptionRequestBuilder::new(f.ledger.domain(), alice.identity)
            .handles(vec![h.clone(), h.clone()])
            .scope(f.ledger.context())
            .scope(f.ledger.context())
            .build()
            .unwrap();
        assert_eq!(req.handles().len(), 1);
        assert_eq!(req.scope().len(), 1);
        assert_eq!(req.duration_days(), 1);
    }

    #[test]
    fn ballot_handles_are_never_public() {
        let mut f = fixture();
        let alice = voter();
        let ballot = cast(&mut f, &alice, 1);
        let tallies = f.ledger.get_poll(f.poll).unwrap().tallies();

        let pair = TallyPair {
            yes: ballot.clone(),
            no: tallies.no,
        };
        assert!(matches!(
            f.ledger.public_decrypt(&pair),
            Err(Error::UnauthorizedDecryption(AuthorizationError::NotPubliclyDecryptable(h))) if h == ballot
        ));
    }

    #[test]
    fn disclosure_of_current_and_earlier_tallies() {
        let mut f = fixture();
        let (alice, bob, carol) = (voter(), voter(), voter());

        let empty = f.ledger.disclose(f.poll).unwrap();
        assert_eq!((empty.num_yes, empty.num_no, empty.total_votes), (0, 0, 0));

        cast(&mut f, &alice, 1);
        let after_one = f.ledger.get_poll(f.poll).unwrap().tallies();
        cast(&mut f, &bob, 0);
        cast(&mut f, &carol, 0);

        let now = f.ledger.disclose(f.poll).unwrap();
        assert_eq!((now.num_yes, now.num_no, now.total_votes), (1, 2, 3));

        let earlier = f.ledger.public_decrypt(&after_one).unwrap();
        assert_eq!(
            (earlier.num_yes, earlier.num_no, earlier.total_votes),
            (1, 0, 1)
        );
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        let mut f = fixture();
        let alice = voter();
        let before = f.ledger.get_poll(f.poll).unwrap().tallies();
        cast(&mut f, &alice, 1);
        let after = f.ledger.get_poll(f.poll).unwrap().tallies();

        // Swapped sides
        let swapped = TallyPair {
            yes: after.no.clone(),
            no: after.yes.clone(),
        };
        assert!(matches!(
            f.ledger.public_decrypt(&swapped),
            Err(Error::InvalidInput(_))
        ));

        // Halves taken at different vote counts
        let stale = TallyPair {
            yes: after.yes,
            no: before.no,
        };
        assert!(matches!(
            f.ledger.public_decrypt(&stale),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn minimum_anonymity_set() {
        let mut f = fixture_with(Config {
            min_disclosure_ballots: 2,
            ..Config::default()
        });
        let (alice, bob) = (voter(), voter());

        cast(&mut f, &alice, 1);
        assert!(matches!(
            f.ledger.disclose(f.poll),
            Err(Error::AnonymitySetTooSmall {
                required: 2,
                actual: 1
            })
        ));

        cast(&mut f, &bob, 0);
        let disclosure = f.ledger.disclose(f.poll).unwrap();
        assert_eq!((disclosure.num_yes, disclosure.num_no), (1, 1));
    }

    #[test]
    fn anonymity_set_cannot_be_bypassed_with_earlier_tallies() {
        let mut f = fixture_with(Config {
            min_disclosure_ballots: 2,
            ..Config::default()
        });
        let (alice, bob, carol) = (voter(), voter(), voter());

        cast(&mut f, &alice, 1);
        cast(&mut f, &bob, 0);
        let after_bob = f.ledger.get_poll(f.poll).unwrap().tallies();
        assert!(f.ledger.public_decrypt(&after_bob).is_ok());

        cast(&mut f, &carol, 1);

        // Subtracting the two-ballot pair from the three-ballot pair would
        // reveal carol's choice
        assert!(matches!(
            f.ledger.public_decrypt(&after_bob),
            Err(Error::UnauthorizedDecryption(AuthorizationError::Superseded(h))) if h == after_bob.yes
        ));

        let disclosure = f.ledger.disclose(f.poll).unwrap();
        assert_eq!((disclosure.num_yes, disclosure.num_no), (2, 1));
    }

    #[test]
    fn earlier_tallies_stay_public_without_anonymity_set() {
        let mut f = fixture();
        let (alice, bob) = (voter(), voter());

        cast(&mut f, &alice, 1);
        let after_alice = f.ledger.get_poll(f.poll).unwrap().tallies();
        cast(&mut f, &bob, 0);

        let disclosure = f.ledger.public_decrypt(&after_alice).unwrap();
        assert_eq!((disclosure.num_yes, disclosure.num_no), (1, 0));
        assert_eq!(disclosure.total_votes, 1);
    }

    #[test]
    fn service_outage_during_decryption() {
        let mut f = fixture();
        let alice = voter();
        let ballot = cast(&mut f, &alice, 1);

        f.engine.inject_fault(Operation::DecryptPublic);
        assert!(matches!(
            f.ledger.disclose(f.poll),
            Err(Error::ServiceUnavailable(_))
        ));

        f.engine.inject_fault(Operation::DecryptPrivate);
        let req = request(&f, &alice, ballot).build().unwrap();
        let signed = Signed::sign(&alice.secret, req).unwrap();
        assert!(matches!(
            f.ledger.user_decrypt(&signed, Utc::now()),
            Err(Error::ServiceUnavailable(_))
        ));
    }
}
