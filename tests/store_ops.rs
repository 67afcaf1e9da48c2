//! End-to-end exercises of the store's public surface: the paths a test CA
//! walks during issuance, renewal, and revocation.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};

use acme_memstore::{
    Account, AccountHandle, Authorization, AuthorizationStatus, Certificate, CertificateHandle,
    Challenge, Identifier, MemoryStore, Order, OrderHandle, OrderStatus, PublicKey,
    RevokedCertificate, SerialNumber, StoreError, StoreResult,
};

fn new_store() -> MemoryStore {
    MemoryStore::new(|order: &Order| -> StoreResult<OrderStatus> { Ok(order.status) })
}

fn account_with_key(seed: u8) -> AccountHandle {
    Account::builder().key(PublicKey::spki([0x30, 0x59, 0x13, seed])).build().into_handle()
}

fn order_for(store: &MemoryStore, account: &AccountHandle, id: &str) -> OrderHandle {
    let order = Order::builder()
        .id(id)
        .account_id(account.read().id.clone())
        .expires(Utc::now() + Duration::hours(1))
        .identifiers(vec![Identifier::dns("example.com")])
        .build()
        .into_handle();
    store.add_order(Arc::clone(&order)).expect("add order");
    order
}

fn certificate_with_serial(serial: u64) -> CertificateHandle {
    let serial = SerialNumber::from(serial);
    let id = serial.to_hex();
    let der = format!("der-{id}").into_bytes();
    Certificate::builder().id(id).der(der).serial(serial).build().into_handle()
}

#[test]
fn issuance_lifecycle() {
    let store = new_store();

    // Registration.
    let account = account_with_key(1);
    store.add_account(Arc::clone(&account)).expect("add account");
    let account_id = account.read().id.clone();
    assert!(!account_id.is_empty());

    // New order with a pending authorization and challenge.
    let order = order_for(&store, &account, "order-1");
    let authz = Authorization::builder()
        .id("authz-1")
        .identifier(Identifier::dns("example.com"))
        .expires(Utc::now() + Duration::hours(1))
        .order(Arc::clone(&order))
        .build()
        .into_handle();
    store.add_authorization(Arc::clone(&authz)).expect("add authorization");
    let challenge =
        Challenge::builder().id("chal-1").token("validation-token").build().into_handle();
    store.add_challenge(challenge).expect("add challenge");

    // Validation succeeds out of band.
    authz.write().status = AuthorizationStatus::Valid;
    let reusable = store
        .find_valid_authorization(&account_id, &Identifier::dns("example.com"))
        .expect("valid authorization for the account");
    assert!(Arc::ptr_eq(&reusable, &authz));

    // Issuance: attach the certificate, index by issued serial.
    let cert = certificate_with_serial(0x0102_0304);
    let serial_key = cert.read().id.clone();
    store.add_certificate(Arc::clone(&cert)).expect("add certificate");
    order.write().certificate = Some(Arc::clone(&cert));
    store.add_order_by_issued_serial(&order).expect("index by serial");

    let issuing = store.order_by_issued_serial(&serial_key).expect("order by serial");
    assert!(Arc::ptr_eq(&issuing, &order));

    // Renewal info and replacement tracking.
    store
        .set_ari_response(&SerialNumber::from(0x0102_0304_u64), "suggested-window")
        .expect("set ari");
    assert_eq!(cert.read().ari_response.as_deref(), Some("suggested-window"));
    store.update_replaced(&serial_key, true).expect("mark replaced");
    assert!(order.read().is_replaced);

    // Revocation keeps the live entry and adds a revoked one.
    let der = cert.read().der.clone();
    store.revoke_certificate(
        RevokedCertificate::builder().certificate(Arc::clone(&cert)).reason(4).build(),
    );
    let revoked = store.revoked_certificate_by_der(&der).expect("revoked by der");
    assert_eq!(revoked.reason, Some(4));
    assert!(store.certificate_by_id(&serial_key).is_some());
}

#[test]
fn account_key_rollover() {
    let store = new_store();
    let account = account_with_key(1);
    let bystander = account_with_key(2);
    store.add_account(Arc::clone(&account)).expect("add account");
    store.add_account(Arc::clone(&bystander)).expect("add bystander");

    // Rolling over to a key someone else holds fails and names the holder.
    let err = store
        .change_account_key(&account, PublicKey::spki([0x30, 0x59, 0x13, 2]))
        .expect_err("occupied key");
    match err {
        StoreError::KeyConflict { account_id, .. } => {
            assert_eq!(account_id, bystander.read().id);
        }
        other => panic!("expected KeyConflict, got {other:?}"),
    }

    // Rolling over to a fresh key succeeds and re-points the key index.
    let fresh = PublicKey::spki([0x30, 0x59, 0x13, 3]);
    store.change_account_key(&account, fresh.clone()).expect("rollover");
    let found = store.account_by_key(&fresh).expect("fingerprint").expect("account");
    assert!(Arc::ptr_eq(&found, &account));
    assert!(store
        .account_by_key(&PublicKey::spki([0x30, 0x59, 0x13, 1]))
        .expect("fingerprint")
        .is_none());
}

#[test]
fn wrapped_keys_share_fingerprints_with_their_contents() {
    let store = new_store();
    let inner = PublicKey::spki(b"shared-spki-bytes");
    let account =
        Account::builder().key(PublicKey::wrapped(inner.clone())).build().into_handle();
    store.add_account(Arc::clone(&account)).expect("add account");

    // Looking up by the unwrapped key finds the same account.
    let found = store.account_by_key(&inner).expect("fingerprint").expect("account");
    assert!(Arc::ptr_eq(&found, &account));

    // An empty container cannot be fingerprinted at all.
    assert!(store.account_by_key(&PublicKey::empty_container()).is_err());
}

#[test]
fn eab_keys_round_trip_and_stay_immutable() {
    let store = new_store();
    let mac = URL_SAFE_NO_PAD.encode(b"hmac-secret");
    store.add_eab_key("kid-1", &mac).expect("add key");

    let stored = store.eab_key_by_id("kid-1").expect("key bytes");
    assert_eq!(&**stored, b"hmac-secret");

    let replacement = URL_SAFE_NO_PAD.encode(b"evil-secret");
    assert!(matches!(
        store.add_eab_key("kid-1", &replacement),
        Err(StoreError::Conflict { .. })
    ));
    assert_eq!(&**store.eab_key_by_id("kid-1").expect("key bytes"), b"hmac-secret");
}

#[test]
fn blocklist_covers_subtrees_only() {
    let store = new_store();
    store.block_domain("forbidden.example").expect("block");
    store.block_domain("exact.test").expect("block");

    assert!(store.is_domain_blocked("forbidden.example"));
    assert!(store.is_domain_blocked("www.forbidden.example"));
    assert!(store.is_domain_blocked("deep.www.forbidden.example"));
    assert!(store.is_domain_blocked("exact.test"));

    assert!(!store.is_domain_blocked("example"));
    assert!(!store.is_domain_blocked("allowed.example"));
    assert!(!store.is_domain_blocked("forbidden.example.org"));
}

#[test]
fn serial_lookups_use_canonical_values() {
    let store = new_store();
    let cert = certificate_with_serial(0x00ab);
    store.add_certificate(Arc::clone(&cert)).expect("add certificate");

    // Leading zero bytes do not change the serial's identity.
    let padded = SerialNumber::from_be_bytes(&[0x00, 0x00, 0x00, 0xab]);
    let found = store.certificate_by_serial(&padded).expect("by padded serial");
    assert!(Arc::ptr_eq(&found, &cert));
}

#[test]
fn status_refresh_applies_to_whole_account_listing() {
    // Orders past their expiry resolve to invalid.
    let store = MemoryStore::new(|order: &Order| -> StoreResult<OrderStatus> {
        Ok(if order.expires <= Utc::now() { OrderStatus::Invalid } else { order.status })
    });

    let expired = Order::builder()
        .id("order-expired")
        .account_id("acct-1")
        .expires(Utc::now() - Duration::hours(1))
        .build()
        .into_handle();
    let live = Order::builder()
        .id("order-live")
        .account_id("acct-1")
        .expires(Utc::now() + Duration::hours(1))
        .build()
        .into_handle();
    store.add_order(expired).expect("add expired");
    store.add_order(live).expect("add live");

    let orders = store.orders_by_account_id("acct-1").expect("listing");
    let statuses: Vec<OrderStatus> = orders.iter().map(|o| o.read().status).collect();
    assert_eq!(statuses, [OrderStatus::Invalid, OrderStatus::Pending]);
}
