//! In-memory datastore for an ACME test server.
//!
//! Holds every protocol entity a test CA works with — accounts, orders,
//! authorizations, challenges, certificates, revocations, external account
//! binding keys, and a domain blocklist — for the lifetime of the process.
//! Nothing is persisted and nothing is deleted; the store is a shared
//! mutable surface for concurrent request handlers, not a database.
//!
//! Entities are shared as [`Handle`]s (`Arc<RwLock<T>>`): the store indexes
//! handles, and everyone holding a handle observes mutations made through
//! it. See [`store`] for the locking rules.
//!
//! # Example
//!
//! ```
//! use acme_memstore::{Account, MemoryStore, Order, OrderStatus, PublicKey, StoreResult};
//! use chrono::{Duration, Utc};
//!
//! // The resolver recomputes an order's status on every read; tests and
//! // simple servers can just report the recorded one.
//! let store = MemoryStore::new(|order: &Order| -> StoreResult<OrderStatus> {
//!     Ok(order.status)
//! });
//!
//! let account = Account::builder()
//!     .key(PublicKey::spki(b"example-spki-der"))
//!     .build()
//!     .into_handle();
//! store.add_account(account.clone())?;
//!
//! let order = Order::builder()
//!     .id("order-1")
//!     .account_id(account.read().id.clone())
//!     .expires(Utc::now() + Duration::hours(1))
//!     .build()
//!     .into_handle();
//! store.add_order(order)?;
//!
//! assert!(store.order_by_id("order-1").is_some());
//! # Ok::<(), acme_memstore::StoreError>(())
//! ```

#![deny(unsafe_code)]

mod blocklist;
pub mod entities;
pub mod error;
pub mod fingerprint;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use entities::{
    Account, AccountHandle, Authorization, AuthorizationHandle, Certificate, CertificateHandle,
    Challenge, ChallengeHandle, Handle, Order, OrderHandle, RevokedCertificate, StatusResolver,
};
pub use error::{BoxError, StoreError, StoreResult};
pub use fingerprint::{fingerprint, KeyFingerprint, PublicKey};
pub use store::MemoryStore;
pub use types::{
    AccountStatus, AuthorizationStatus, ChallengeStatus, Identifier, IdentifierKind, OrderStatus,
    SerialNumber,
};
