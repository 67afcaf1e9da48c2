//! Protocol entities and the per-entity lock tier.
//!
//! Every entity is created once, published into the store's indices, and
//! then lives for the process lifetime. Indices hand out [`Handle`]s —
//! reference-counted, lock-guarded shared instances — so there is exactly
//! one canonical mutable copy of each entity no matter how many indices
//! reference it.
//!
//! # Locking
//!
//! The handle's `RwLock` is the *entity lock*: it guards mutation of an
//! entity's fields after insertion. It is independent of the store lock
//! that guards the shape of the indices themselves. Lock order is always
//! store lock first, then entity lock; see [`MemoryStore`](crate::store::MemoryStore).

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    error::StoreResult,
    types::{
        AccountStatus, AuthorizationStatus, ChallengeStatus, Identifier, OrderStatus, SerialNumber,
    },
};

/// A shared, lock-guarded entity instance.
///
/// The `RwLock` is the entity's own lock (the finer tier of the two-tier
/// locking scheme); the `Arc` lets multiple indices reference the one
/// canonical instance.
pub type Handle<T> = Arc<RwLock<T>>;

/// Shared handle to an [`Account`].
pub type AccountHandle = Handle<Account>;
/// Shared handle to an [`Order`].
pub type OrderHandle = Handle<Order>;
/// Shared handle to an [`Authorization`].
pub type AuthorizationHandle = Handle<Authorization>;
/// Shared handle to a [`Challenge`].
pub type ChallengeHandle = Handle<Challenge>;
/// Shared handle to a [`Certificate`].
pub type CertificateHandle = Handle<Certificate>;

/// A registered holder of a public key.
///
/// The ID is assigned by [`MemoryStore::add_account`](crate::store::MemoryStore::add_account);
/// builders may leave it empty. The key is optional only so that a missing
/// key can be rejected with a validation error at insertion time.
#[derive(Clone, Debug, bon::Builder)]
pub struct Account {
    /// Process-unique account ID (random hex, assigned at insertion).
    #[builder(into, default)]
    pub id: String,

    /// The account's public key. Required for insertion; globally unique
    /// by fingerprint.
    pub key: Option<crate::fingerprint::PublicKey>,

    /// Account lifecycle status.
    #[builder(default = AccountStatus::Valid)]
    pub status: AccountStatus,

    /// Contact URLs supplied at registration.
    #[builder(default)]
    pub contact: Vec<String>,
}

impl Account {
    /// Wraps the account in its entity lock.
    #[must_use]
    pub fn into_handle(self) -> AccountHandle {
        Arc::new(RwLock::new(self))
    }
}

/// A request to issue a certificate for a set of identifiers.
///
/// The stored `status` is a cache of the last recomputation; store reads
/// refresh it through the [`StatusResolver`] before returning the order.
#[derive(Clone, Debug, bon::Builder)]
pub struct Order {
    /// Process-unique order ID.
    #[builder(into)]
    pub id: String,

    /// ID of the account that placed the order.
    #[builder(into)]
    pub account_id: String,

    /// Cached lifecycle status; recomputed on every store read.
    #[builder(default = OrderStatus::Pending)]
    pub status: OrderStatus,

    /// When the order expires.
    pub expires: DateTime<Utc>,

    /// The identifiers the order covers.
    #[builder(default)]
    pub identifiers: Vec<Identifier>,

    /// The issued certificate, once finalization completes.
    pub certificate: Option<CertificateHandle>,

    /// Whether a later order superseded this one (ARI replacement).
    #[builder(default)]
    pub is_replaced: bool,
}

impl Order {
    /// Wraps the order in its entity lock.
    #[must_use]
    pub fn into_handle(self) -> OrderHandle {
        Arc::new(RwLock::new(self))
    }
}

/// Proof-of-control record for one identifier within an order.
///
/// Authorizations are mutated by the validation machinery outside the
/// store's own write path, so readers always take the entity lock to get a
/// consistent snapshot.
#[derive(Clone, Debug, bon::Builder)]
pub struct Authorization {
    /// Process-unique authorization ID.
    #[builder(into)]
    pub id: String,

    /// The identifier this authorization covers.
    pub identifier: Identifier,

    /// Authorization lifecycle status.
    #[builder(default = AuthorizationStatus::Pending)]
    pub status: AuthorizationStatus,

    /// When the authorization expires.
    pub expires: DateTime<Utc>,

    /// The order this authorization belongs to.
    pub order: Option<OrderHandle>,
}

impl Authorization {
    /// Wraps the authorization in its entity lock.
    #[must_use]
    pub fn into_handle(self) -> AuthorizationHandle {
        Arc::new(RwLock::new(self))
    }
}

/// One concrete method of proving control of an identifier.
#[derive(Clone, Debug, bon::Builder)]
pub struct Challenge {
    /// Process-unique challenge ID.
    #[builder(into)]
    pub id: String,

    /// The challenge token presented to the client.
    #[builder(into, default)]
    pub token: String,

    /// Challenge lifecycle status.
    #[builder(default = ChallengeStatus::Pending)]
    pub status: ChallengeStatus,
}

impl Challenge {
    /// Wraps the challenge in its entity lock.
    #[must_use]
    pub fn into_handle(self) -> ChallengeHandle {
        Arc::new(RwLock::new(self))
    }
}

/// An issued certificate.
///
/// By convention the ID is the lowercase hex encoding of the serial number,
/// which is also the key of the issued-serial order index.
#[derive(Clone, Debug, bon::Builder)]
pub struct Certificate {
    /// Certificate ID; shares a namespace with revoked certificate IDs.
    #[builder(into)]
    pub id: String,

    /// The certificate's DER encoding.
    #[builder(into)]
    pub der: Bytes,

    /// The certificate's serial number.
    pub serial: SerialNumber,

    /// Renewal-information response body, set after issuance.
    pub ari_response: Option<String>,
}

impl Certificate {
    /// Wraps the certificate in its entity lock.
    #[must_use]
    pub fn into_handle(self) -> CertificateHandle {
        Arc::new(RwLock::new(self))
    }
}

/// A revoked certificate together with its revocation metadata.
///
/// Shares the certificate ID namespace with live certificates; no field is
/// mutated after insertion, so revoked entries are shared without an entity
/// lock.
#[derive(Clone, Debug, bon::Builder)]
pub struct RevokedCertificate {
    /// The certificate that was revoked.
    pub certificate: CertificateHandle,

    /// When the revocation took effect.
    #[builder(default = Utc::now())]
    pub revoked_at: DateTime<Utc>,

    /// CRL reason code, if one was given.
    pub reason: Option<u8>,
}

/// Recomputes an order's status from its current state.
///
/// The resolver is the seam to the collaborator state machine: the store
/// never decides order lifecycle itself, it only caches what the resolver
/// returns. The resolver must be a pure function of the order snapshot it
/// is given.
///
/// A closure `Fn(&Order) -> StoreResult<OrderStatus>` can be used directly:
///
/// ```
/// use acme_memstore::{
///     entities::Order,
///     error::StoreResult,
///     store::MemoryStore,
///     types::OrderStatus,
/// };
///
/// let store = MemoryStore::new(|order: &Order| -> StoreResult<OrderStatus> {
///     Ok(order.status)
/// });
/// # drop(store);
/// ```
pub trait StatusResolver: Send + Sync {
    /// Computes the status for the given order snapshot.
    ///
    /// An error return is treated by the store as a broken invariant, not a
    /// recoverable condition.
    fn order_status(&self, order: &Order) -> StoreResult<OrderStatus>;
}

impl<F> StatusResolver for F
where
    F: Fn(&Order) -> StoreResult<OrderStatus> + Send + Sync,
{
    fn order_status(&self, order: &Order) -> StoreResult<OrderStatus> {
        self(order)
    }
}
