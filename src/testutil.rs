//! Test helpers for exercising [`MemoryStore`].
//!
//! Compiled for this crate's own tests and, behind the `testutil` feature,
//! for downstream integration tests.

use crate::{
    entities::{Account, AccountHandle, Certificate, CertificateHandle, Order},
    error::StoreResult,
    fingerprint::PublicKey,
    store::MemoryStore,
    types::{OrderStatus, SerialNumber},
};

/// A resolver that reports whatever status the order already carries.
///
/// Most tests want reads to be observationally inert; pass this to
/// [`MemoryStore::new`] to get that.
pub fn recorded_status(order: &Order) -> StoreResult<OrderStatus> {
    Ok(order.status)
}

/// An empty store wired to [`recorded_status`].
#[must_use]
pub fn test_store() -> MemoryStore {
    MemoryStore::new(recorded_status)
}

/// A deterministic public key; distinct seeds give distinct fingerprints.
#[must_use]
pub fn test_key(seed: u8) -> PublicKey {
    PublicKey::spki([0x30, 0x59, 0x13, seed])
}

/// An unregistered account holding [`test_key`]`(seed)`.
#[must_use]
pub fn valid_account(seed: u8) -> AccountHandle {
    Account::builder().key(test_key(seed)).build().into_handle()
}

/// A certificate whose ID is the hex form of `serial`, with synthetic DER
/// bytes derived from it.
#[must_use]
pub fn issued_certificate(serial: u64) -> CertificateHandle {
    let serial = SerialNumber::from(serial);
    let id = serial.to_hex();
    let der = format!("der-for-{id}").into_bytes();
    Certificate::builder().id(id).der(der).serial(serial).build().into_handle()
}

/// Asserts that a store result is the given [`StoreError`] variant.
///
/// [`StoreError`]: crate::StoreError
#[macro_export]
macro_rules! assert_store_error {
    ($result:expr, $variant:ident) => {{
        match $result {
            Err($crate::StoreError::$variant { .. }) => {}
            other => panic!(
                "expected StoreError::{}, got {:?}",
                stringify!($variant),
                other
            ),
        }
    }};
}

/// Asserts that a store result is `Ok`, yielding its value.
#[macro_export]
macro_rules! assert_store_ok {
    ($result:expr) => {{
        match $result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok, got error: {err}"),
        }
    }};
}
