//! The in-memory store and its indices.
//!
//! [`MemoryStore`] holds every protocol entity for the lifetime of the
//! process. All index maps live inside one [`Indexes`] struct behind a
//! single [`parking_lot::RwLock`] — the *store lock* — so operations that
//! touch several indices under one writer acquisition are atomic with
//! respect to each other. Individual entities carry their own lock (see
//! [`Handle`](crate::entities::Handle)); mutating a published entity's
//! fields takes that entity lock, not the store lock.
//!
//! # Locking rules
//!
//! - Mutating operations take the store lock exclusively; lookups take it
//!   in shared mode for the whole operation, linear scans included.
//! - Lock order is store lock, then entity lock. No path acquires the store
//!   lock twice in one logical call chain: composite operations such as
//!   [`update_replaced`](MemoryStore::update_replaced) delegate the single
//!   store-lock acquisition to the lookup they wrap and touch only the
//!   entity lock themselves.
//! - Lookup-then-mutate pairs (status refresh on read, replaced-flag
//!   updates) are not atomic end to end; another thread may observe the
//!   entity between the two acquisitions. Accepted for this workload.

use std::{collections::HashMap, sync::Arc};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use zeroize::Zeroizing;

use crate::{
    blocklist::DomainBlocklist,
    entities::{
        AccountHandle, AuthorizationHandle, CertificateHandle, ChallengeHandle, OrderHandle,
        RevokedCertificate, StatusResolver,
    },
    error::{StoreError, StoreResult},
    fingerprint::{fingerprint, KeyFingerprint, PublicKey},
    types::{AuthorizationStatus, Identifier, SerialNumber},
};

/// Every index map, collectively guarded by the store lock.
#[derive(Default)]
struct Indexes {
    accounts_by_id: HashMap<String, AccountHandle>,
    /// Keyed by the hex SHA-256 fingerprint of the account's public key.
    accounts_by_fingerprint: HashMap<KeyFingerprint, AccountHandle>,

    orders_by_id: HashMap<String, OrderHandle>,
    /// Append-only order list per account; created on first insert.
    orders_by_account_id: HashMap<String, Vec<OrderHandle>>,
    /// Keyed by the issued certificate's ID (the hex serial).
    orders_by_issued_serial: HashMap<String, OrderHandle>,

    authorizations_by_id: HashMap<String, AuthorizationHandle>,

    challenges_by_id: HashMap<String, ChallengeHandle>,

    /// Live and revoked certificates share one ID namespace: an ID present
    /// in either map blocks insertion into the other.
    certificates_by_id: HashMap<String, CertificateHandle>,
    revoked_certificates_by_id: HashMap<String, Arc<RevokedCertificate>>,

    /// Write-once EAB keys, stored decoded.
    eab_keys_by_id: HashMap<String, Zeroizing<Vec<u8>>>,

    blocklist: DomainBlocklist,
}

/// In-memory datastore for every ACME protocol entity.
///
/// Nothing is persisted and nothing is ever deleted; entities live until
/// the process exits. Linear scans (lookups by DER or serial) are accepted
/// at test-server scale.
///
/// # Cloning
///
/// `MemoryStore` is cheaply cloneable via [`Arc`]. All clones share the
/// same indices and status resolver.
#[derive(Clone)]
pub struct MemoryStore {
    indexes: Arc<RwLock<Indexes>>,
    /// Collaborator state machine that recomputes order status on read.
    status: Arc<dyn StatusResolver>,
}

impl MemoryStore {
    /// Creates an empty store that recomputes order status through the
    /// given resolver.
    pub fn new<R: StatusResolver + 'static>(resolver: R) -> Self {
        Self { indexes: Arc::new(RwLock::new(Indexes::default())), status: Arc::new(resolver) }
    }

    // ── Accounts ────────────────────────────────────────────────────

    /// Looks up an account by its ID.
    #[must_use]
    pub fn account_by_id(&self, id: &str) -> Option<AccountHandle> {
        self.indexes.read().accounts_by_id.get(id).cloned()
    }

    /// Looks up an account by its public key.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be fingerprinted.
    pub fn account_by_key(&self, key: &PublicKey) -> StoreResult<Option<AccountHandle>> {
        let fp = fingerprint(key)?;
        Ok(self.indexes.read().accounts_by_fingerprint.get(&fp).cloned())
    }

    /// Adds a new account, assigning it a fresh random ID, and returns the
    /// resulting account count.
    ///
    /// The ID is drawn from the full `u64` space and retried until unused;
    /// it is unpredictable, but only uniqueness is load-bearing. The
    /// ID-indexed and fingerprint-indexed entries are installed under one
    /// writer acquisition.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the account has no key.
    /// - [`StoreError::Conflict`] if another account already holds a key
    ///   with the same fingerprint.
    #[tracing::instrument(skip(self, account))]
    pub fn add_account(&self, account: AccountHandle) -> StoreResult<usize> {
        let fp = {
            let guard = account.read();
            let key = guard
                .key
                .as_ref()
                .ok_or_else(|| StoreError::validation("account must have a key"))?;
            fingerprint(key)?
        };

        let mut idx = self.indexes.write();

        if idx.accounts_by_fingerprint.contains_key(&fp) {
            return Err(StoreError::conflict(format!(
                "an account with key fingerprint {fp} already exists"
            )));
        }

        let id = loop {
            let candidate = format!("{:x}", rand::thread_rng().gen::<u64>());
            if !idx.accounts_by_id.contains_key(&candidate) {
                break candidate;
            }
        };

        account.write().id.clone_from(&id);
        idx.accounts_by_id.insert(id, Arc::clone(&account));
        idx.accounts_by_fingerprint.insert(fp, account);
        Ok(idx.accounts_by_id.len())
    }

    /// Republishes the account stored under `id` in both account indices.
    ///
    /// Assumes the account's key is unchanged: the fingerprint is
    /// recomputed from the given account and overwrites that fingerprint's
    /// entry. Must **not** be used to change an account's key — that would
    /// leave the old fingerprint entry dangling. Use
    /// [`change_account_key`](Self::change_account_key) instead.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no account has the given ID.
    /// - [`StoreError::Validation`] / [`StoreError::Encoding`] if the
    ///   account's key is missing or cannot be fingerprinted.
    #[tracing::instrument(skip(self, account))]
    pub fn update_account_by_id(&self, id: &str, account: AccountHandle) -> StoreResult<()> {
        let fp = {
            let guard = account.read();
            let key = guard
                .key
                .as_ref()
                .ok_or_else(|| StoreError::validation("account must have a key"))?;
            fingerprint(key)?
        };

        let mut idx = self.indexes.write();
        if !idx.accounts_by_id.contains_key(id) {
            return Err(StoreError::not_found(id));
        }
        idx.accounts_by_id.insert(id.to_owned(), Arc::clone(&account));
        idx.accounts_by_fingerprint.insert(fp, account);
        Ok(())
    }

    /// Changes an account's key, keeping the one-key-one-account invariant.
    ///
    /// Under a single writer acquisition: removes the old fingerprint
    /// entry, installs the account under the new fingerprint, updates the
    /// key field, and republishes the ID-indexed entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyConflict`] if the new key's fingerprint already
    /// maps to a *different* account; the store and the account are left
    /// unchanged.
    #[tracing::instrument(skip(self, account, new_key))]
    pub fn change_account_key(
        &self,
        account: &AccountHandle,
        new_key: PublicKey,
    ) -> StoreResult<()> {
        let old_fp = {
            let guard = account.read();
            let key = guard
                .key
                .as_ref()
                .ok_or_else(|| StoreError::validation("account must have a key"))?;
            fingerprint(key)?
        };
        let new_fp = fingerprint(&new_key)?;

        let mut idx = self.indexes.write();

        if let Some(existing) = idx.accounts_by_fingerprint.get(&new_fp) {
            if !Arc::ptr_eq(existing, account) {
                return Err(StoreError::key_conflict(Arc::clone(existing)));
            }
        }

        idx.accounts_by_fingerprint.remove(&old_fp);
        let id = {
            let mut guard = account.write();
            guard.key = Some(new_key);
            guard.id.clone()
        };
        idx.accounts_by_fingerprint.insert(new_fp, Arc::clone(account));
        idx.accounts_by_id.insert(id, Arc::clone(account));
        Ok(())
    }

    // ── Orders ──────────────────────────────────────────────────────

    /// Adds a new order and returns the resulting order count.
    ///
    /// The by-ID entry and the per-account list entry are installed under
    /// one writer acquisition, so the two indices never disagree.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the order's ID is empty.
    /// - [`StoreError::Conflict`] if the ID is already present.
    #[tracing::instrument(skip(self, order))]
    pub fn add_order(&self, order: OrderHandle) -> StoreResult<usize> {
        let (id, account_id) = {
            let guard = order.read();
            (guard.id.clone(), guard.account_id.clone())
        };
        if id.is_empty() {
            return Err(StoreError::validation("order must have a non-empty ID"));
        }

        let mut idx = self.indexes.write();
        if idx.orders_by_id.contains_key(&id) {
            return Err(StoreError::conflict(format!("order {id:?} already exists")));
        }

        idx.orders_by_account_id.entry(account_id).or_default().push(Arc::clone(&order));
        idx.orders_by_id.insert(id, order);
        Ok(idx.orders_by_id.len())
    }

    /// Indexes an order by the serial of the certificate it issued.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`] if the order does not reference an issued
    /// certificate.
    #[tracing::instrument(skip(self, order))]
    pub fn add_order_by_issued_serial(&self, order: &OrderHandle) -> StoreResult<()> {
        let serial_key = {
            let guard = order.read();
            let cert = guard.certificate.as_ref().ok_or_else(|| {
                StoreError::validation("order must reference an issued certificate")
            })?;
            let id = cert.read().id.clone();
            id
        };

        self.indexes.write().orders_by_issued_serial.insert(serial_key, Arc::clone(order));
        Ok(())
    }

    /// Looks up an order by its ID, refreshing its status first.
    ///
    /// # Panics
    ///
    /// Panics if the status resolver fails: a status that cannot be
    /// recomputed is a broken invariant, and callers have no way to act on
    /// it.
    #[must_use]
    pub fn order_by_id(&self, id: &str) -> Option<OrderHandle> {
        let idx = self.indexes.read();
        let order = idx.orders_by_id.get(id).cloned()?;
        self.refresh_status(&order);
        Some(order)
    }

    /// Returns every order placed by the account, oldest first, refreshing
    /// each order's status.
    ///
    /// # Panics
    ///
    /// Panics if the status resolver fails for any order (see
    /// [`order_by_id`](Self::order_by_id)).
    #[must_use]
    pub fn orders_by_account_id(&self, account_id: &str) -> Option<Vec<OrderHandle>> {
        let idx = self.indexes.read();
        let orders = idx.orders_by_account_id.get(account_id)?.clone();
        for order in &orders {
            self.refresh_status(order);
        }
        Some(orders)
    }

    /// Returns the order that resulted in the given certificate serial.
    ///
    /// Absence here indicates a caller logic error, so it is an explicit
    /// [`StoreError::NotFound`] rather than an empty result. The status is
    /// not refreshed.
    pub fn order_by_issued_serial(&self, serial: &str) -> StoreResult<OrderHandle> {
        self.indexes
            .read()
            .orders_by_issued_serial
            .get(serial)
            .cloned()
            .ok_or_else(|| StoreError::not_found(serial))
    }

    /// Marks the order that issued `serial` as replaced or not replaced.
    ///
    /// The store lock is acquired exactly once, inside
    /// [`order_by_issued_serial`](Self::order_by_issued_serial); this
    /// method itself only takes the order's entity lock. Holding the store
    /// lock across the nested lookup would self-deadlock.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if `serial` is empty.
    /// - [`StoreError::NotFound`] if no order issued that serial.
    #[tracing::instrument(skip(self))]
    pub fn update_replaced(&self, serial: &str, replaced: bool) -> StoreResult<()> {
        if serial.is_empty() {
            return Err(StoreError::validation("no serial provided"));
        }
        let order = self.order_by_issued_serial(serial)?;
        order.write().is_replaced = replaced;
        Ok(())
    }

    /// Recomputes and writes back an order's status.
    ///
    /// The snapshot is taken under the order's shared lock, the write-back
    /// under its exclusive lock; the gap between the two is the documented
    /// non-atomicity of read-path refreshes.
    fn refresh_status(&self, order: &OrderHandle) {
        let computed = {
            let guard = order.read();
            match self.status.order_status(&guard) {
                Ok(status) => status,
                Err(err) => {
                    panic!("status recomputation failed for order {:?}: {err}", guard.id)
                }
            }
        };
        order.write().status = computed;
    }

    // ── Authorizations ──────────────────────────────────────────────

    /// Adds a new authorization and returns the resulting count.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the authorization's ID is empty.
    /// - [`StoreError::Conflict`] if the ID is already present.
    #[tracing::instrument(skip(self, authz))]
    pub fn add_authorization(&self, authz: AuthorizationHandle) -> StoreResult<usize> {
        let id = authz.read().id.clone();
        if id.is_empty() {
            return Err(StoreError::validation("authorization must have a non-empty ID"));
        }

        let mut idx = self.indexes.write();
        if idx.authorizations_by_id.contains_key(&id) {
            return Err(StoreError::conflict(format!("authorization {id:?} already exists")));
        }
        idx.authorizations_by_id.insert(id, authz);
        Ok(idx.authorizations_by_id.len())
    }

    /// Looks up an authorization by its ID.
    #[must_use]
    pub fn authorization_by_id(&self, id: &str) -> Option<AuthorizationHandle> {
        self.indexes.read().authorizations_by_id.get(id).cloned()
    }

    /// Finds a valid, unexpired authorization for the identifier, belonging
    /// to an order of the given account.
    ///
    /// Linear scan under the store's shared lock; each candidate is
    /// additionally read under its own lock, because authorizations are
    /// mutated by the validation machinery outside the store's write path.
    /// Iteration order is unspecified: if several authorizations match,
    /// which one is returned is undefined.
    #[must_use]
    pub fn find_valid_authorization(
        &self,
        account_id: &str,
        identifier: &Identifier,
    ) -> Option<AuthorizationHandle> {
        let idx = self.indexes.read();
        let now = Utc::now();
        for authz in idx.authorizations_by_id.values() {
            let guard = authz.read();
            if guard.status != AuthorizationStatus::Valid || guard.identifier != *identifier {
                continue;
            }
            let Some(order) = guard.order.as_ref() else {
                continue;
            };
            if order.read().account_id == account_id && guard.expires > now {
                return Some(Arc::clone(authz));
            }
        }
        None
    }

    // ── Challenges ──────────────────────────────────────────────────

    /// Adds a new challenge and returns the resulting count.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the challenge's ID is empty.
    /// - [`StoreError::Conflict`] if the ID is already present.
    #[tracing::instrument(skip(self, challenge))]
    pub fn add_challenge(&self, challenge: ChallengeHandle) -> StoreResult<usize> {
        let id = challenge.read().id.clone();
        if id.is_empty() {
            return Err(StoreError::validation("challenge must have a non-empty ID"));
        }

        let mut idx = self.indexes.write();
        if idx.challenges_by_id.contains_key(&id) {
            return Err(StoreError::conflict(format!("challenge {id:?} already exists")));
        }
        idx.challenges_by_id.insert(id, challenge);
        Ok(idx.challenges_by_id.len())
    }

    /// Looks up a challenge by its ID.
    #[must_use]
    pub fn challenge_by_id(&self, id: &str) -> Option<ChallengeHandle> {
        self.indexes.read().challenges_by_id.get(id).cloned()
    }

    // ── Certificates and revocations ────────────────────────────────

    /// Adds a live certificate and returns the resulting live-certificate
    /// count.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the certificate's ID is empty.
    /// - [`StoreError::Conflict`] if the ID exists in either the live or
    ///   the revoked index — the two share one namespace.
    #[tracing::instrument(skip(self, cert))]
    pub fn add_certificate(&self, cert: CertificateHandle) -> StoreResult<usize> {
        let id = cert.read().id.clone();
        if id.is_empty() {
            return Err(StoreError::validation("certificate must have a non-empty ID"));
        }

        let mut idx = self.indexes.write();
        if idx.certificates_by_id.contains_key(&id) {
            return Err(StoreError::conflict(format!("certificate {id:?} already exists")));
        }
        if idx.revoked_certificates_by_id.contains_key(&id) {
            return Err(StoreError::conflict(format!(
                "certificate {id:?} already exists (and is revoked)"
            )));
        }
        idx.certificates_by_id.insert(id, cert);
        Ok(idx.certificates_by_id.len())
    }

    /// Looks up a live certificate by its ID. O(1).
    #[must_use]
    pub fn certificate_by_id(&self, id: &str) -> Option<CertificateHandle> {
        self.indexes.read().certificates_by_id.get(id).cloned()
    }

    /// Finds the live certificate with exactly these DER bytes.
    ///
    /// Unindexed O(n) scan; acceptable at test-server scale.
    #[must_use]
    pub fn certificate_by_der(&self, der: &[u8]) -> Option<CertificateHandle> {
        let idx = self.indexes.read();
        idx.certificates_by_id.values().find(|cert| cert.read().der.as_ref() == der).cloned()
    }

    /// Finds the revoked certificate with exactly these DER bytes.
    ///
    /// Unindexed O(n) scan; acceptable at test-server scale.
    #[must_use]
    pub fn revoked_certificate_by_der(&self, der: &[u8]) -> Option<Arc<RevokedCertificate>> {
        let idx = self.indexes.read();
        idx.revoked_certificates_by_id
            .values()
            .find(|revoked| revoked.certificate.read().der.as_ref() == der)
            .cloned()
    }

    /// Finds the live certificate with the given serial number.
    ///
    /// Unindexed O(n) scan comparing canonical serial values.
    #[must_use]
    pub fn certificate_by_serial(&self, serial: &SerialNumber) -> Option<CertificateHandle> {
        let idx = self.indexes.read();
        idx.certificates_by_id.values().find(|cert| cert.read().serial == *serial).cloned()
    }

    /// Finds the revoked certificate with the given serial number.
    ///
    /// Unindexed O(n) scan comparing canonical serial values.
    #[must_use]
    pub fn revoked_certificate_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Option<Arc<RevokedCertificate>> {
        let idx = self.indexes.read();
        idx.revoked_certificates_by_id
            .values()
            .find(|revoked| revoked.certificate.read().serial == *serial)
            .cloned()
    }

    /// Records a certificate revocation, keyed by the wrapped certificate's
    /// ID.
    ///
    /// The live index keeps its entry: a revoked certificate remains
    /// reachable through live lookups, and whether that should change is a
    /// protocol-layer decision, not the store's.
    #[tracing::instrument(skip(self, revoked))]
    pub fn revoke_certificate(&self, revoked: RevokedCertificate) {
        let id = revoked.certificate.read().id.clone();
        self.indexes.write().revoked_certificates_by_id.insert(id, Arc::new(revoked));
    }

    /// Sets the renewal-information response of the live certificate with
    /// the given serial.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no live certificate has that serial.
    #[tracing::instrument(skip(self, response))]
    pub fn set_ari_response(
        &self,
        serial: &SerialNumber,
        response: impl Into<String>,
    ) -> StoreResult<()> {
        let idx = self.indexes.write();
        let cert = idx.certificates_by_id.values().find(|cert| cert.read().serial == *serial);
        match cert {
            Some(cert) => {
                cert.write().ari_response = Some(response.into());
                Ok(())
            }
            None => Err(StoreError::not_found(serial.to_hex())),
        }
    }

    // ── External account binding keys ───────────────────────────────

    /// Stores an EAB key under its key ID, decoding the unpadded base64url
    /// key material first.
    ///
    /// Entries are write-once: a key ID can never be overwritten.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if either argument is empty.
    /// - [`StoreError::Decode`] if the key is not valid unpadded base64url.
    /// - [`StoreError::Conflict`] if the key ID is already present.
    #[tracing::instrument(skip(self, encoded_key))]
    pub fn add_eab_key(&self, key_id: &str, encoded_key: &str) -> StoreResult<()> {
        if key_id.is_empty() || encoded_key.is_empty() {
            return Err(StoreError::validation("key ID and key must not be empty"));
        }

        let decoded = URL_SAFE_NO_PAD.decode(encoded_key).map_err(|err| {
            StoreError::decode_with_source(
                format!("failed to decode base64url key {encoded_key:?}"),
                err,
            )
        })?;

        let mut idx = self.indexes.write();
        if idx.eab_keys_by_id.contains_key(key_id) {
            return Err(StoreError::conflict(format!("key ID {key_id:?} is already present")));
        }
        idx.eab_keys_by_id.insert(key_id.to_owned(), Zeroizing::new(decoded));
        Ok(())
    }

    /// Returns the decoded raw key bytes stored under the key ID.
    #[must_use]
    pub fn eab_key_by_id(&self, key_id: &str) -> Option<Zeroizing<Vec<u8>>> {
        self.indexes.read().eab_keys_by_id.get(key_id).cloned()
    }

    // ── Domain blocklist ────────────────────────────────────────────

    /// Adds a domain to the blocklist, blocking it and its whole subtree.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`] if the name is empty.
    #[tracing::instrument(skip(self))]
    pub fn block_domain(&self, name: &str) -> StoreResult<()> {
        self.indexes.write().blocklist.insert(name)
    }

    /// Whether the domain, or any ancestor of it, is blocked.
    #[must_use]
    pub fn is_domain_blocked(&self, name: &str) -> bool {
        self.indexes.read().blocklist.contains(name)
    }
}
