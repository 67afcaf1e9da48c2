//! Public key fingerprinting.
//!
//! A fingerprint is the lowercase hex encoding of the SHA-256 digest over a
//! key's canonical SubjectPublicKeyInfo encoding. It is the key's identity
//! inside the store: the account index uses it to enforce that every public
//! key belongs to at most one account.

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

/// A public key as the store sees it.
///
/// Keys arrive either already in canonical SubjectPublicKeyInfo form or
/// wrapped (possibly several levels deep) in a JWK-style container that may
/// be empty. Fingerprinting unwraps containers recursively and rejects an
/// empty one.
///
/// # Examples
///
/// ```
/// use acme_memstore::fingerprint::{fingerprint, PublicKey};
///
/// let key = PublicKey::spki([0x30, 0x2a, 0x05, 0x00].as_slice());
/// let wrapped = PublicKey::wrapped(key.clone());
/// assert_eq!(fingerprint(&key).unwrap(), fingerprint(&wrapped).unwrap());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    /// Canonical SubjectPublicKeyInfo DER bytes.
    Spki(Bytes),
    /// A JWK-style container around another key; `None` means the container
    /// is present but empty.
    Jwk(Option<Box<PublicKey>>),
}

impl PublicKey {
    /// Creates a key from canonical SubjectPublicKeyInfo bytes.
    #[must_use]
    pub fn spki(der: impl AsRef<[u8]>) -> Self {
        Self::Spki(Bytes::copy_from_slice(der.as_ref()))
    }

    /// Wraps a key in one container level.
    #[must_use]
    pub fn wrapped(inner: PublicKey) -> Self {
        Self::Jwk(Some(Box::new(inner)))
    }

    /// A container with no key inside. Fingerprinting rejects it.
    #[must_use]
    pub fn empty_container() -> Self {
        Self::Jwk(None)
    }
}

/// A public key's identity string: hex-encoded SHA-256 over its canonical
/// encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyFingerprint(String);

impl KeyFingerprint {
    /// The fingerprint as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes the fingerprint of a public key.
///
/// Containers are unwrapped recursively; equal key material always yields
/// an identical fingerprint regardless of wrapping depth.
///
/// # Errors
///
/// - [`StoreError::Validation`] if a container is present but empty.
/// - [`StoreError::Encoding`] if the key has no canonical encoding (empty
///   key material).
pub fn fingerprint(key: &PublicKey) -> StoreResult<KeyFingerprint> {
    match key {
        PublicKey::Jwk(None) => {
            Err(StoreError::validation("cannot compute the fingerprint of an empty key container"))
        }
        PublicKey::Jwk(Some(inner)) => fingerprint(inner),
        PublicKey::Spki(der) => {
            if der.is_empty() {
                return Err(StoreError::encoding("key has no SubjectPublicKeyInfo encoding"));
            }
            let digest = Sha256::digest(der);
            Ok(KeyFingerprint(hex::encode(digest)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let key = PublicKey::spki(b"spki-bytes");
        assert_eq!(fingerprint(&key).unwrap(), fingerprint(&key).unwrap());
    }

    #[test]
    fn wrapping_does_not_change_identity() {
        let key = PublicKey::spki(b"spki-bytes");
        let once = PublicKey::wrapped(key.clone());
        let twice = PublicKey::wrapped(once.clone());
        let base = fingerprint(&key).unwrap();
        assert_eq!(fingerprint(&once).unwrap(), base);
        assert_eq!(fingerprint(&twice).unwrap(), base);
    }

    #[test]
    fn distinct_keys_distinct_fingerprints() {
        let a = fingerprint(&PublicKey::spki(b"key-a")).unwrap();
        let b = fingerprint(&PublicKey::spki(b"key-b")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_container_is_rejected() {
        let err = fingerprint(&PublicKey::empty_container()).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));

        // Also when nested inside another container.
        let nested = PublicKey::wrapped(PublicKey::empty_container());
        assert!(matches!(fingerprint(&nested).unwrap_err(), StoreError::Validation { .. }));
    }

    #[test]
    fn unencodable_key_is_rejected() {
        let err = fingerprint(&PublicKey::spki(b"")).unwrap_err();
        assert!(matches!(err, StoreError::Encoding { .. }));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint(&PublicKey::spki(b"spki-bytes")).unwrap();
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.to_string(), fp.as_str());
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Fingerprinting is a pure function of the key material.
            #[test]
            fn determinism(der in proptest::collection::vec(any::<u8>(), 1..128)) {
                let key = PublicKey::spki(&der);
                let first = fingerprint(&key).unwrap();
                let second = fingerprint(&PublicKey::wrapped(key)).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
