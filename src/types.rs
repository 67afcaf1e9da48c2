//! Plain protocol types shared across the store.
//!
//! This module defines the value types that entities are built from:
//! certificate serial numbers, ACME identifiers, and the per-entity status
//! enums. All of them are cheap to clone and compare; none of them carry
//! locks.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A certificate serial number of arbitrary precision.
///
/// Stored as the canonical big-endian magnitude (leading zero bytes
/// stripped), so equality and hashing match integer equality regardless of
/// how many leading zeros the input encoding carried.
///
/// # Examples
///
/// ```
/// use acme_memstore::types::SerialNumber;
///
/// let a = SerialNumber::from_be_bytes(&[0x00, 0x00, 0x1f, 0x2e]);
/// let b = SerialNumber::from(0x1f2e_u64);
/// assert_eq!(a, b);
/// assert_eq!(a.to_hex(), "1f2e");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SerialNumber(Bytes);

impl SerialNumber {
    /// Creates a serial number from big-endian magnitude bytes.
    ///
    /// Leading zero bytes are stripped to produce the canonical form; an
    /// all-zero (or empty) input is the serial number zero.
    #[must_use]
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        Self(Bytes::copy_from_slice(&bytes[first..]))
    }

    /// The canonical big-endian magnitude bytes (empty for zero).
    #[must_use]
    pub fn as_be_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex encoding of the serial, without leading zeros.
    ///
    /// This is the string used as the issued-serial index key; by
    /// convention it is also the certificate's ID.
    #[must_use]
    pub fn to_hex(&self) -> String {
        if self.0.is_empty() {
            "0".to_owned()
        } else {
            let encoded = hex::encode(&self.0);
            // A stripped magnitude can still start with a zero nibble.
            encoded.trim_start_matches('0').to_owned()
        }
    }
}

impl From<u64> for SerialNumber {
    fn from(value: u64) -> Self {
        Self::from_be_bytes(&value.to_be_bytes())
    }
}

impl std::fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The type of an ACME identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// A DNS name.
    Dns,
    /// An IP address.
    Ip,
}

/// An identifier an order or authorization applies to.
///
/// Equality is field-wise: two identifiers match when both the kind and the
/// value are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The identifier type.
    #[serde(rename = "type")]
    pub kind: IdentifierKind,
    /// The identifier value (DNS name or textual IP address).
    pub value: String,
}

impl Identifier {
    /// Creates a DNS identifier.
    #[must_use]
    pub fn dns(value: impl Into<String>) -> Self {
        Self { kind: IdentifierKind::Dns, value: value.into() }
    }

    /// Creates an IP identifier.
    #[must_use]
    pub fn ip(value: impl Into<String>) -> Self {
        Self { kind: IdentifierKind::Ip, value: value.into() }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Generates a status enum with lowercase serde renames and a matching
/// `Display` implementation.
macro_rules! define_status {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let text = match self {
                    $(Self::$variant => $text,)+
                };
                write!(f, "{text}")
            }
        }
    };
}

define_status!(
    /// Lifecycle status of an account.
    AccountStatus {
        /// The account is usable.
        Valid => "valid",
        /// The account deactivated itself.
        Deactivated => "deactivated",
        /// The server revoked the account.
        Revoked => "revoked",
    }
);

define_status!(
    /// Lifecycle status of an order.
    ///
    /// The stored value is a cache; readers recompute it from the order's
    /// current state on every store lookup.
    OrderStatus {
        /// Waiting on authorizations.
        Pending => "pending",
        /// All authorizations valid; ready to finalize.
        Ready => "ready",
        /// Finalization in progress.
        Processing => "processing",
        /// A certificate was issued.
        Valid => "valid",
        /// The order can no longer be completed.
        Invalid => "invalid",
    }
);

define_status!(
    /// Lifecycle status of an authorization.
    AuthorizationStatus {
        /// Waiting on a challenge.
        Pending => "pending",
        /// A challenge succeeded.
        Valid => "valid",
        /// A challenge failed.
        Invalid => "invalid",
        /// Deactivated by the account.
        Deactivated => "deactivated",
        /// The authorization expired.
        Expired => "expired",
        /// Revoked by the server.
        Revoked => "revoked",
    }
);

define_status!(
    /// Lifecycle status of a challenge.
    ChallengeStatus {
        /// Not yet attempted.
        Pending => "pending",
        /// Validation in progress.
        Processing => "processing",
        /// Validation succeeded.
        Valid => "valid",
        /// Validation failed.
        Invalid => "invalid",
    }
);
